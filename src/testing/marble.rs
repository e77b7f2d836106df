//! Marble diagram parsing.
//!
//! One character is one frame, and one frame is one millisecond of virtual
//! time:
//!
//! | Syntax   | Meaning                                                     |
//! |----------|-------------------------------------------------------------|
//! | `-`      | nothing happens for one frame                               |
//! | space    | ignored, used for alignment                                 |
//! | `a`      | any other character: a value                                |
//! | `\|`     | completion                                                  |
//! | `#`      | failure, carrying [`DEFAULT_ERROR`]                         |
//! | `(ab\|)` | synchronous group, all events on the group's first frame    |
//! | `20ms`   | time progression (`ms`, `s` or `m`), must stand alone       |
//! | `^` `!`  | subscription and unsubscription points (subscription logs)  |

use std::fmt;

/// Error payload carried by `#` in marble diagrams.
pub const DEFAULT_ERROR: &str = "error";

/// One signal delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T, E = String> {
    /// A value.
    Next(T),
    /// The failure signal.
    Error(E),
    /// Normal completion.
    Complete,
}

impl<T, E> Notification<T, E> {
    /// Whether this ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }
}

/// A notification stamped with the frame it was observed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded<T, E = String> {
    /// Frame of the notification, in milliseconds since the time origin.
    pub frame: u64,
    /// What happened.
    pub notification: Notification<T, E>,
}

impl<T, E> Recorded<T, E> {
    /// Shorthand for a value at `frame`.
    pub fn next(frame: u64, value: T) -> Self {
        Self {
            frame,
            notification: Notification::Next(value),
        }
    }

    /// Shorthand for a failure at `frame`.
    pub fn error(frame: u64, error: E) -> Self {
        Self {
            frame,
            notification: Notification::Error(error),
        }
    }

    /// Shorthand for completion at `frame`.
    pub fn complete(frame: u64) -> Self {
        Self {
            frame,
            notification: Notification::Complete,
        }
    }
}

/// The window during which a source had a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionLog {
    /// Frame of the subscription.
    pub subscribed: u64,
    /// Frame of the unsubscription, `None` while still subscribed.
    pub unsubscribed: Option<u64>,
}

/// Error returned for malformed marble diagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarbleError {
    /// `(` inside a group.
    NestedGroup {
        /// Character offset.
        position: usize,
    },
    /// `)` without a matching `(`.
    UnmatchedGroupEnd {
        /// Character offset.
        position: usize,
    },
    /// A group was never closed.
    UnclosedGroup,
    /// A time progression inside a group.
    TimeInGroup {
        /// Character offset.
        position: usize,
    },
    /// A marker that is not valid in this kind of diagram.
    UnexpectedMarker {
        /// The offending character.
        marker: char,
        /// Character offset.
        position: usize,
    },
    /// A subscription diagram without `^`.
    MissingSubscription,
    /// A value character that has no entry in the value table.
    UnknownValue {
        /// The offending character.
        value: char,
    },
}

impl fmt::Display for MarbleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NestedGroup { position } => write!(f, "nested group at offset {}", position),
            Self::UnmatchedGroupEnd { position } => {
                write!(f, "unmatched ')' at offset {}", position)
            }
            Self::UnclosedGroup => write!(f, "group is never closed"),
            Self::TimeInGroup { position } => {
                write!(f, "time progression inside a group at offset {}", position)
            }
            Self::UnexpectedMarker { marker, position } => {
                write!(f, "unexpected '{}' at offset {}", marker, position)
            }
            Self::MissingSubscription => write!(f, "subscription diagram has no '^'"),
            Self::UnknownValue { value } => write!(f, "no value defined for '{}'", value),
        }
    }
}

impl std::error::Error for MarbleError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Value(char),
    Complete,
    Error,
    Subscribe,
    Unsubscribe,
}

#[derive(Debug)]
struct Event {
    frame: u64,
    position: usize,
    token: Token,
}

fn tokenize(marbles: &str) -> Result<Vec<Event>, MarbleError> {
    let chars: Vec<char> = marbles.chars().collect();
    let mut events = Vec::new();
    let mut frame = 0u64;
    let mut group: Option<u64> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let token_start = i == 0 || chars[i - 1].is_whitespace();
        if token_start && c.is_ascii_digit() {
            if let Some((frames, len)) = time_progression(&chars[i..]) {
                if group.is_some() {
                    return Err(MarbleError::TimeInGroup { position: i });
                }
                frame = frame.saturating_add(frames);
                i += len;
                continue;
            }
        }

        let at = group.unwrap_or(frame);
        let token = match c {
            '-' => None,
            '(' => {
                if group.is_some() {
                    return Err(MarbleError::NestedGroup { position: i });
                }
                group = Some(frame);
                None
            }
            ')' => {
                if group.take().is_none() {
                    return Err(MarbleError::UnmatchedGroupEnd { position: i });
                }
                None
            }
            '|' => Some(Token::Complete),
            '#' => Some(Token::Error),
            '^' => Some(Token::Subscribe),
            '!' => Some(Token::Unsubscribe),
            other => Some(Token::Value(other)),
        };
        if let Some(token) = token {
            events.push(Event {
                frame: at,
                position: i,
                token,
            });
        }

        frame += 1;
        i += 1;
    }

    if group.is_some() {
        return Err(MarbleError::UnclosedGroup);
    }
    Ok(events)
}

/// Match `<digits><unit>` followed by whitespace or the end of input.
/// Returns the number of frames and the characters consumed.
fn time_progression(chars: &[char]) -> Option<(u64, usize)> {
    let digits = chars.iter().take_while(|c| c.is_ascii_digit()).count();
    let amount: u64 = chars[..digits].iter().collect::<String>().parse().ok()?;
    let rest = &chars[digits..];

    let (scale, unit_len) = match rest {
        ['m', 's', ..] => (1, 2),
        ['s', ..] => (1_000, 1),
        ['m', ..] => (60_000, 1),
        _ => return None,
    };

    let len = digits + unit_len;
    match chars.get(len) {
        Some(c) if !c.is_whitespace() => None,
        _ => Some((amount.saturating_mul(scale), len)),
    }
}

fn build<V, F>(marbles: &str, mut value: F) -> Result<Vec<Recorded<V>>, MarbleError>
where
    F: FnMut(char) -> Result<V, MarbleError>,
{
    tokenize(marbles)?
        .into_iter()
        .map(|event| {
            let notification = match event.token {
                Token::Value(c) => Notification::Next(value(c)?),
                Token::Complete => Notification::Complete,
                Token::Error => Notification::Error(DEFAULT_ERROR.to_string()),
                Token::Subscribe | Token::Unsubscribe => {
                    return Err(MarbleError::UnexpectedMarker {
                        marker: if event.token == Token::Subscribe { '^' } else { '!' },
                        position: event.position,
                    });
                }
            };
            Ok(Recorded {
                frame: event.frame,
                notification,
            })
        })
        .collect()
}

/// Parse a diagram whose values are the characters themselves.
///
/// ```rust
/// use eddy::testing::{parse_marbles, Recorded};
///
/// let events = parse_marbles("-a 2ms (b|)").unwrap();
/// assert_eq!(
///     events,
///     vec![
///         Recorded::next(1, 'a'),
///         Recorded::next(4, 'b'),
///         Recorded::complete(4),
///     ]
/// );
/// ```
pub fn parse_marbles(marbles: &str) -> Result<Vec<Recorded<char>>, MarbleError> {
    build(marbles, Ok)
}

/// Parse a diagram, looking value characters up in `values`.
pub fn parse_marbles_with<V: Clone>(
    marbles: &str,
    values: &[(char, V)],
) -> Result<Vec<Recorded<V>>, MarbleError> {
    build(marbles, |c| {
        values
            .iter()
            .find(|(key, _)| *key == c)
            .map(|(_, v)| v.clone())
            .ok_or(MarbleError::UnknownValue { value: c })
    })
}

/// Parse a subscription diagram such as `"---- 20ms ^---!"`.
pub fn parse_subscription(marbles: &str) -> Result<SubscriptionLog, MarbleError> {
    let mut subscribed = None;
    let mut unsubscribed = None;

    for event in tokenize(marbles)? {
        let unexpected = |marker| MarbleError::UnexpectedMarker {
            marker,
            position: event.position,
        };
        match event.token {
            Token::Subscribe if subscribed.is_none() => subscribed = Some(event.frame),
            Token::Subscribe => return Err(unexpected('^')),
            Token::Unsubscribe if subscribed.is_some() && unsubscribed.is_none() => {
                unsubscribed = Some(event.frame)
            }
            Token::Unsubscribe => return Err(unexpected('!')),
            Token::Value(c) => return Err(unexpected(c)),
            Token::Complete => return Err(unexpected('|')),
            Token::Error => return Err(unexpected('#')),
        }
    }

    Ok(SubscriptionLog {
        subscribed: subscribed.ok_or(MarbleError::MissingSubscription)?,
        unsubscribed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashes_advance_one_frame() {
        assert_eq!(
            parse_marbles("-a--#").unwrap(),
            vec![
                Recorded::next(1, 'a'),
                Recorded::error(4, DEFAULT_ERROR.to_string())
            ]
        );
    }

    #[test]
    fn whitespace_is_ignored() {
        assert_eq!(parse_marbles("  -a  -|").unwrap(), parse_marbles("-a-|").unwrap());
    }

    #[test]
    fn time_progression_advances_frames() {
        let events = parse_marbles("-a-- 20ms -a-- 40ms -a-- 80ms -a-- #").unwrap();
        let frames: Vec<u64> = events.iter().map(|e| e.frame).collect();

        assert_eq!(frames, vec![1, 25, 69, 153, 156]);
    }

    #[test]
    fn seconds_and_minutes() {
        assert_eq!(parse_marbles("1s a").unwrap(), vec![Recorded::next(1_000, 'a')]);
        assert_eq!(parse_marbles("1m a").unwrap(), vec![Recorded::next(60_000, 'a')]);
    }

    #[test]
    fn digits_without_unit_are_values() {
        assert_eq!(
            parse_marbles("1-2").unwrap(),
            vec![Recorded::next(0, '1'), Recorded::next(2, '2')]
        );
    }

    #[test]
    fn group_shares_a_frame_and_spans_its_width() {
        let events = parse_marbles("500ms (ab|)").unwrap();
        assert_eq!(
            events,
            vec![
                Recorded::next(500, 'a'),
                Recorded::next(500, 'b'),
                Recorded::complete(500)
            ]
        );

        // the group occupies five frames
        let after = parse_marbles("(ab)c").unwrap();
        assert_eq!(after.last(), Some(&Recorded::next(4, 'c')));
    }

    #[test]
    fn interval_diagram() {
        let events = parse_marbles("200ms a 199ms b 199ms c 199ms d 199ms (e|)").unwrap();
        let frames: Vec<u64> = events.iter().map(|e| e.frame).collect();

        assert_eq!(frames, vec![200, 400, 600, 800, 1_000, 1_000]);
    }

    #[test]
    fn values_are_mapped() {
        let events = parse_marbles_with("-a-b|", &[('a', 1), ('b', 20)]).unwrap();
        assert_eq!(
            events,
            vec![
                Recorded::next(1, 1),
                Recorded::next(3, 20),
                Recorded::complete(4)
            ]
        );
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert_eq!(
            parse_marbles_with("-x", &[('a', 1)]),
            Err(MarbleError::UnknownValue { value: 'x' })
        );
    }

    #[test]
    fn malformed_groups_are_rejected() {
        assert_eq!(
            parse_marbles("((a))"),
            Err(MarbleError::NestedGroup { position: 1 })
        );
        assert_eq!(
            parse_marbles("a)"),
            Err(MarbleError::UnmatchedGroupEnd { position: 1 })
        );
        assert_eq!(parse_marbles("(ab"), Err(MarbleError::UnclosedGroup));
        assert_eq!(
            parse_marbles("( 5ms a)"),
            Err(MarbleError::TimeInGroup { position: 2 })
        );
    }

    #[test]
    fn subscription_markers_are_not_values() {
        assert_eq!(
            parse_marbles("-^"),
            Err(MarbleError::UnexpectedMarker {
                marker: '^',
                position: 1
            })
        );
    }

    #[test]
    fn subscription_windows() {
        assert_eq!(
            parse_subscription("^---!").unwrap(),
            SubscriptionLog {
                subscribed: 0,
                unsubscribed: Some(4)
            }
        );
        assert_eq!(
            parse_subscription("---- 20ms ---- 40ms ^---!").unwrap(),
            SubscriptionLog {
                subscribed: 68,
                unsubscribed: Some(72)
            }
        );
        assert_eq!(
            parse_subscription("--^--").unwrap(),
            SubscriptionLog {
                subscribed: 2,
                unsubscribed: None
            }
        );
        assert_eq!(
            parse_subscription("-----(^!)").unwrap(),
            SubscriptionLog {
                subscribed: 5,
                unsubscribed: Some(5)
            }
        );
    }

    #[test]
    fn subscription_errors() {
        assert_eq!(parse_subscription("---!"), Err(MarbleError::UnexpectedMarker {
            marker: '!',
            position: 3
        }));
        assert_eq!(parse_subscription("----"), Err(MarbleError::MissingSubscription));
        assert!(parse_subscription("^-a-!").is_err());
    }

    #[test]
    fn error_display() {
        let err = MarbleError::UnexpectedMarker {
            marker: '^',
            position: 3,
        };
        assert_eq!(err.to_string(), "unexpected '^' at offset 3");
    }
}
