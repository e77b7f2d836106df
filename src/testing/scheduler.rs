//! Cold and hot observables and a recorder running on tokio's clock.

use std::fmt;
use std::future::Future;
use std::pin::{pin, Pin};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{ready, Stream, StreamExt};
use tokio::time::{self, Instant, Sleep};

use super::marble::{
    parse_marbles, parse_marbles_with, parse_subscription, MarbleError, Notification, Recorded,
    SubscriptionLog,
};
use crate::ops::saturating_millis;
use crate::source::Source;

fn frame_between(origin: Instant, at: Instant) -> u64 {
    saturating_millis(at.saturating_duration_since(origin))
}

fn parsed<T>(marbles: &str, result: Result<T, MarbleError>) -> T {
    result.unwrap_or_else(|e| panic!("invalid marble diagram {:?}: {}", marbles, e))
}

/// Virtual-time harness for marble tests.
///
/// The scheduler fixes a time origin; every frame it reports or consumes is
/// a millisecond offset from that origin. Run tests on tokio's paused clock
/// (`#[tokio::test(start_paused = true)]`) so that time only moves to the next
/// pending timer and frames are exact.
///
/// # Example
///
/// ```rust
/// use eddy::assert_marbles;
/// use eddy::source::Source;
/// use eddy::testing::TestScheduler;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().start_paused(true).build().unwrap().block_on(async {
/// let scheduler = TestScheduler::new();
/// let source = scheduler.cold("-a-b|");
///
/// let recorded = scheduler.record(source.subscribe()).await;
/// assert_marbles!(recorded, "-a-b|");
/// # });
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TestScheduler {
    origin: Instant,
}

impl Default for TestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TestScheduler {
    /// Start a scheduler whose frame 0 is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// The current frame.
    pub fn frame(&self) -> u64 {
        frame_between(self.origin, Instant::now())
    }

    /// The instant of `frame`.
    pub fn instant(&self, frame: u64) -> Instant {
        self.origin + Duration::from_millis(frame)
    }

    /// A cold source replaying `marbles`, values being the characters.
    ///
    /// # Panics
    ///
    /// Panics if the diagram is malformed.
    pub fn cold(&self, marbles: &str) -> ColdObservable<char> {
        ColdObservable::new(self.origin, parsed(marbles, parse_marbles(marbles)))
    }

    /// A cold source replaying `marbles` with values looked up in `values`.
    ///
    /// # Panics
    ///
    /// Panics if the diagram is malformed or uses an undefined value.
    pub fn cold_with<V: Clone>(&self, marbles: &str, values: &[(char, V)]) -> ColdObservable<V> {
        ColdObservable::new(self.origin, parsed(marbles, parse_marbles_with(marbles, values)))
    }

    /// A hot source playing `marbles` on the scheduler's own timeline.
    ///
    /// Frames count from the scheduler origin, not from the subscription. A
    /// subscriber sees only the events after the frame it subscribed on, and
    /// a subscriber arriving once the timeline has ended gets its terminal
    /// signal straight away.
    ///
    /// # Panics
    ///
    /// Panics if the diagram is malformed.
    pub fn hot(&self, marbles: &str) -> HotObservable<char> {
        HotObservable::new(self.origin, parsed(marbles, parse_marbles(marbles)))
    }

    /// A hot source playing `marbles` with values looked up in `values`.
    ///
    /// # Panics
    ///
    /// Panics if the diagram is malformed or uses an undefined value.
    pub fn hot_with<V: Clone>(&self, marbles: &str, values: &[(char, V)]) -> HotObservable<V> {
        HotObservable::new(self.origin, parsed(marbles, parse_marbles_with(marbles, values)))
    }

    /// The notifications `marbles` describes, values being the characters.
    ///
    /// # Panics
    ///
    /// Panics if the diagram is malformed.
    pub fn expected(&self, marbles: &str) -> Vec<Recorded<char>> {
        parsed(marbles, parse_marbles(marbles))
    }

    /// The notifications `marbles` describes, with values looked up in
    /// `values`.
    ///
    /// # Panics
    ///
    /// Panics if the diagram is malformed or uses an undefined value.
    pub fn expected_with<V: Clone>(&self, marbles: &str, values: &[(char, V)]) -> Vec<Recorded<V>> {
        parsed(marbles, parse_marbles_with(marbles, values))
    }

    /// The subscription window a `^`/`!` diagram describes.
    ///
    /// # Panics
    ///
    /// Panics if the diagram is malformed.
    pub fn subscription(&self, marbles: &str) -> SubscriptionLog {
        parsed(marbles, parse_subscription(marbles))
    }

    /// Drive `stream` to its terminal signal, stamping every notification
    /// with its frame. The first `Err` item is terminal.
    pub async fn record<St, T, E>(&self, stream: St) -> Vec<Recorded<T, E>>
    where
        St: Stream<Item = Result<T, E>>,
    {
        let mut stream = pin!(stream);
        let mut recorded = Vec::new();

        while let Some(item) = stream.next().await {
            let frame = self.frame();
            match item {
                Ok(value) => recorded.push(Recorded::next(frame, value)),
                Err(error) => {
                    recorded.push(Recorded::error(frame, error));
                    return recorded;
                }
            }
        }

        recorded.push(Recorded::complete(self.frame()));
        recorded
    }

    /// Like [`record`](Self::record), but unsubscribe (drop the stream) at
    /// `frame` if it has not terminated by then.
    pub async fn record_until<St, T, E>(&self, stream: St, frame: u64) -> Vec<Recorded<T, E>>
    where
        St: Stream<Item = Result<T, E>>,
    {
        let mut stream = pin!(stream);
        let mut recorded = Vec::new();
        let deadline = self.instant(frame);

        loop {
            let Ok(item) = time::timeout_at(deadline, stream.next()).await else {
                return recorded;
            };
            let frame = self.frame();
            match item {
                Some(Ok(value)) => recorded.push(Recorded::next(frame, value)),
                Some(Err(error)) => {
                    recorded.push(Recorded::error(frame, error));
                    return recorded;
                }
                None => {
                    recorded.push(Recorded::complete(frame));
                    return recorded;
                }
            }
        }
    }
}

/// A source that replays a fixed timeline on every subscription and logs
/// when each subscription starts and ends.
pub struct ColdObservable<V> {
    origin: Instant,
    timeline: Arc<[Recorded<V>]>,
    subscriptions: Arc<Mutex<Vec<SubscriptionLog>>>,
}

impl<V> ColdObservable<V> {
    fn new(origin: Instant, timeline: Vec<Recorded<V>>) -> Self {
        Self {
            origin,
            timeline: timeline.into(),
            subscriptions: Arc::default(),
        }
    }

    /// Every subscription made so far, in order.
    pub fn subscriptions(&self) -> Vec<SubscriptionLog> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<V> Clone for ColdObservable<V> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            timeline: self.timeline.clone(),
            subscriptions: self.subscriptions.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for ColdObservable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColdObservable")
            .field("timeline", &self.timeline)
            .field("subscriptions", &self.subscriptions())
            .finish()
    }
}

impl<V: Clone> Source for ColdObservable<V> {
    type Item = V;
    type Error = String;
    type Stream = MarbleStream<V>;

    fn subscribe(&self) -> MarbleStream<V> {
        let guard = SubscriptionGuard::open(self.origin, &self.subscriptions);
        MarbleStream {
            zero: Instant::now(),
            timeline: self.timeline.clone(),
            cursor: 0,
            sleep: None,
            done: false,
            guard,
        }
    }
}

/// A source whose timeline runs from the scheduler origin whether or not
/// anyone is subscribed, logging each subscription like
/// [`ColdObservable`].
pub struct HotObservable<V> {
    origin: Instant,
    timeline: Arc<[Recorded<V>]>,
    subscriptions: Arc<Mutex<Vec<SubscriptionLog>>>,
}

impl<V> HotObservable<V> {
    fn new(origin: Instant, timeline: Vec<Recorded<V>>) -> Self {
        Self {
            origin,
            timeline: timeline.into(),
            subscriptions: Arc::default(),
        }
    }

    /// Every subscription made so far, in order.
    pub fn subscriptions(&self) -> Vec<SubscriptionLog> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<V> Clone for HotObservable<V> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            timeline: self.timeline.clone(),
            subscriptions: self.subscriptions.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for HotObservable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotObservable")
            .field("timeline", &self.timeline)
            .field("subscriptions", &self.subscriptions())
            .finish()
    }
}

impl<V: Clone> Source for HotObservable<V> {
    type Item = V;
    type Error = String;
    type Stream = MarbleStream<V>;

    fn subscribe(&self) -> MarbleStream<V> {
        let guard = SubscriptionGuard::open(self.origin, &self.subscriptions);
        let now = guard.subscribed;
        // Events of the subscribing frame have already been played; a
        // terminal event is last, so once reached it is always kept.
        let cursor = self
            .timeline
            .iter()
            .position(|event| event.frame > now || event.notification.is_terminal())
            .unwrap_or(self.timeline.len());

        MarbleStream {
            zero: self.origin,
            timeline: self.timeline.clone(),
            cursor,
            sleep: None,
            done: false,
            guard,
        }
    }
}

struct SubscriptionGuard {
    origin: Instant,
    subscribed: u64,
    logs: Arc<Mutex<Vec<SubscriptionLog>>>,
    index: usize,
}

impl SubscriptionGuard {
    fn open(origin: Instant, logs: &Arc<Mutex<Vec<SubscriptionLog>>>) -> Self {
        let subscribed = frame_between(origin, Instant::now());
        let index = {
            let mut logs = logs.lock().unwrap_or_else(PoisonError::into_inner);
            logs.push(SubscriptionLog {
                subscribed,
                unsubscribed: None,
            });
            logs.len() - 1
        };
        Self {
            origin,
            subscribed,
            logs: logs.clone(),
            index,
        }
    }

    fn close(&self) {
        let frame = frame_between(self.origin, Instant::now());
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(log) = logs.get_mut(self.index) {
            log.unsubscribed.get_or_insert(frame);
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// One subscription to a [`ColdObservable`] or a [`HotObservable`].
///
/// A timeline without `|` or `#` never ends: once its events are exhausted
/// the stream stays pending.
#[must_use = "streams do nothing unless polled"]
pub struct MarbleStream<V> {
    // frame 0 of the timeline
    zero: Instant,
    timeline: Arc<[Recorded<V>]>,
    cursor: usize,
    sleep: Option<Pin<Box<Sleep>>>,
    done: bool,
    guard: SubscriptionGuard,
}

impl<V> fmt::Debug for MarbleStream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarbleStream")
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<V: Clone> Stream for MarbleStream<V> {
    type Item = Result<V, String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let Some(event) = this.timeline.get(this.cursor) else {
            return Poll::Pending;
        };

        let deadline = this.zero + Duration::from_millis(event.frame);
        let notification = event.notification.clone();
        if deadline > Instant::now() {
            let sleep = this
                .sleep
                .get_or_insert_with(|| Box::pin(time::sleep_until(deadline)));
            ready!(sleep.as_mut().poll(cx));
        }
        this.sleep = None;
        this.cursor += 1;

        match notification {
            Notification::Next(value) => Poll::Ready(Some(Ok(value))),
            Notification::Error(error) => {
                this.done = true;
                this.guard.close();
                Poll::Ready(Some(Err(error)))
            }
            Notification::Complete => {
                this.done = true;
                this.guard.close();
                Poll::Ready(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cold_replays_its_timeline() {
        let scheduler = TestScheduler::new();
        let source = scheduler.cold("-a-(bc)|");

        let recorded = scheduler.record(source.subscribe()).await;

        assert_eq!(recorded, parse_marbles("-a-(bc)|").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn each_subscription_starts_at_frame_zero_of_its_own() {
        let scheduler = TestScheduler::new();
        let source = scheduler.cold("--a|");

        let _ = scheduler.record(source.subscribe()).await;
        let second = scheduler.record(source.subscribe()).await;

        assert_eq!(second, vec![Recorded::next(5, 'a'), Recorded::complete(6)]);
        assert_eq!(
            source.subscriptions(),
            vec![
                parse_subscription("^--!").unwrap(),
                parse_subscription("---^--!").unwrap(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn record_until_unsubscribes() {
        let scheduler = TestScheduler::new();
        let source = scheduler.cold("-a-b-c-d");

        let recorded = scheduler.record_until(source.subscribe(), 4).await;

        assert_eq!(recorded, vec![Recorded::next(1, 'a'), Recorded::next(3, 'b')]);
        assert_eq!(
            source.subscriptions(),
            vec![parse_subscription("^---!").unwrap()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn never_ending_timeline_stays_pending() {
        let scheduler = TestScheduler::new();
        let source = scheduler.cold("-a");

        let recorded = scheduler.record_until(source.subscribe(), 100).await;

        assert_eq!(recorded, vec![Recorded::next(1, 'a')]);
        assert_eq!(scheduler.frame(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn error_closes_the_subscription() {
        let scheduler = TestScheduler::new();
        let source = scheduler.cold_with("-x#", &[('x', 10)]);
        let mut stream = source.subscribe();

        assert_eq!(stream.next().await, Some(Ok(10)));
        assert_eq!(stream.next().await, Some(Err("error".to_string())));
        assert_eq!(
            source.subscriptions(),
            vec![parse_subscription("^-!").unwrap()]
        );
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn hot_plays_against_the_scheduler_origin() {
        let scheduler = TestScheduler::new();
        let source = scheduler.hot("-a-b-c|");

        time::sleep(Duration::from_millis(2)).await;
        let recorded = scheduler.record(source.subscribe()).await;

        assert_eq!(
            recorded,
            vec![
                Recorded::next(3, 'b'),
                Recorded::next(5, 'c'),
                Recorded::complete(6),
            ]
        );
        assert_eq!(
            source.subscriptions(),
            vec![parse_subscription("--^---!").unwrap()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hot_skips_events_of_the_subscribing_frame() {
        let scheduler = TestScheduler::new();
        let source = scheduler.hot_with("-x-y|", &[('x', 1), ('y', 2)]);

        time::sleep(Duration::from_millis(1)).await;
        let recorded = scheduler.record(source.subscribe()).await;

        assert_eq!(recorded, vec![Recorded::next(3, 2), Recorded::complete(4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_hot_subscriber_gets_the_terminal_signal_at_once() {
        let scheduler = TestScheduler::new();
        let completed = scheduler.hot("-a|");
        let failed = scheduler.hot("-a#");

        time::sleep(Duration::from_millis(5)).await;

        assert_eq!(
            scheduler.record(completed.subscribe()).await,
            vec![Recorded::complete(5)]
        );
        assert_eq!(
            scheduler.record(failed.subscribe()).await,
            vec![Recorded::error(5, "error".to_string())]
        );
        assert_eq!(
            completed.subscriptions(),
            vec![parse_subscription("-----(^!)").unwrap()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_share_one_hot_timeline() {
        let scheduler = TestScheduler::new();
        let source = scheduler.hot("-a-b-c|");

        let early = source.subscribe();
        let late = async {
            time::sleep(Duration::from_millis(3)).await;
            scheduler.record(source.subscribe()).await
        };
        let (early, late) = tokio::join!(scheduler.record(early), late);

        assert_eq!(early, parse_marbles("-a-b-c|").unwrap());
        assert_eq!(late, vec![Recorded::next(5, 'c'), Recorded::complete(6)]);
        assert_eq!(
            source.subscriptions(),
            vec![
                parse_subscription("^-----!").unwrap(),
                parse_subscription("---^--!").unwrap(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expectations_come_from_diagrams() {
        let scheduler = TestScheduler::new();
        let source = scheduler.cold_with("-a 3ms (b|)", &[('a', 1), ('b', 2)]);

        let recorded = scheduler.record(source.subscribe()).await;

        assert_eq!(
            recorded,
            scheduler.expected_with("-a 3ms (b|)", &[('a', 1), ('b', 2)])
        );
        assert_eq!(
            scheduler.expected("-a|"),
            vec![Recorded::next(1, 'a'), Recorded::complete(2)]
        );
        assert_eq!(source.subscriptions(), vec![scheduler.subscription("^----!")]);
    }

    #[test]
    #[should_panic(expected = "invalid marble diagram")]
    fn malformed_cold_diagram_panics() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            TestScheduler::new().cold("(a");
        });
    }
}
