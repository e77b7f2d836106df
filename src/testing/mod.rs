//! Marble testing for streams.
//!
//! A marble diagram describes a timeline as text: `"-a--#"` is a value `a` on
//! frame 1 and a failure on frame 4. This module parses diagrams, builds cold
//! and hot sources from them, and records what a stream actually emits so the
//! two can be compared.
//!
//! Time is tokio's clock, paused. With `#[tokio::test(start_paused = true)]`
//! the runtime jumps straight to the next pending timer whenever every task is
//! idle, so a test covering seconds of backoff finishes instantly and every
//! frame is exact.
//!
//! # Example
//!
//! ```rust
//! use eddy::source::{Source, SourceExt};
//! use eddy::testing::TestScheduler;
//! use eddy::{assert_marbles, assert_subscriptions};
//! use std::time::Duration;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().start_paused(true).build().unwrap().block_on(async {
//! let scheduler = TestScheduler::new();
//! let failing = scheduler.cold("-a--#");
//!
//! let result = failing.clone().retry_exp_time(Duration::from_millis(20)).subscribe();
//!
//! assert_marbles!(
//!     scheduler.record(result).await,
//!     "-a-- 20ms -a-- 40ms -a-- 80ms -a-- #"
//! );
//! assert_subscriptions!(
//!     failing.subscriptions(),
//!     [
//!         "^---!",
//!         "---- 20ms ^---!",
//!         "---- 20ms ---- 40ms ^---!",
//!         "---- 20ms ---- 40ms ---- 80ms ^---!",
//!     ]
//! );
//! # });
//! ```

mod marble;
mod scheduler;

pub use marble::{
    parse_marbles, parse_marbles_with, parse_subscription, MarbleError, Notification, Recorded,
    SubscriptionLog, DEFAULT_ERROR,
};
pub use scheduler::{ColdObservable, HotObservable, MarbleStream, TestScheduler};

/// Assert that recorded notifications match a marble diagram.
///
/// The optional third argument maps value characters, as in
/// [`parse_marbles_with`].
///
/// # Panics
///
/// Panics if the diagram is malformed or the notifications differ.
#[macro_export]
macro_rules! assert_marbles {
    ($recorded:expr, $marbles:expr) => {{
        let marbles: &str = $marbles;
        let expected = $crate::testing::parse_marbles(marbles)
            .unwrap_or_else(|e| panic!("invalid marble diagram {:?}: {}", marbles, e));
        assert_eq!($recorded, expected, "timeline differs from {:?}", marbles);
    }};
    ($recorded:expr, $marbles:expr, $values:expr) => {{
        let marbles: &str = $marbles;
        let expected = $crate::testing::parse_marbles_with(marbles, $values)
            .unwrap_or_else(|e| panic!("invalid marble diagram {:?}: {}", marbles, e));
        assert_eq!($recorded, expected, "timeline differs from {:?}", marbles);
    }};
}

/// Assert that a source's subscription logs match subscription diagrams.
///
/// # Panics
///
/// Panics if a diagram is malformed or the logs differ.
#[macro_export]
macro_rules! assert_subscriptions {
    ($logs:expr, [$($marbles:expr),* $(,)?]) => {{
        let expected: ::std::vec::Vec<$crate::testing::SubscriptionLog> = ::std::vec![
            $($crate::testing::parse_subscription($marbles).unwrap_or_else(|e| {
                panic!("invalid subscription diagram {:?}: {}", $marbles, e)
            })),*
        ];
        assert_eq!($logs, expected);
    }};
}
