//! A small state-holding service exposing a few observable streams.
//!
//! [`EventStore`] owns a "last event" cell and the list of listeners
//! registered through [`EventStore::event_stream`]. It is an ordinary value:
//! construct one and hand clones of the handle to whoever needs it.
//!
//! # Example
//!
//! ```rust
//! use eddy::store::EventStore;
//! use futures::StreamExt;
//!
//! # tokio_test::block_on(async {
//! let store = EventStore::new();
//! let events = store.event_stream();
//!
//! for value in [1, 1, 2] {
//!     store.emit(value);
//! }
//! drop(store);
//!
//! // consecutive duplicates are suppressed per listener
//! assert_eq!(events.collect::<Vec<_>>().await, vec![1, 2]);
//! # });
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::channel::mpsc;
use futures::{stream, Stream, StreamExt};

use crate::ops::{delay_subscription, distinct_until_changed, interval};

/// Timing of the store's derived streams.
///
/// ```rust
/// use eddy::store::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default().with_interval_count(3);
///
/// assert_eq!(config.values_delay(), Duration::from_millis(500));
/// assert_eq!(config.interval_period(), Duration::from_millis(200));
/// assert_eq!(config.interval_count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreConfig {
    values_delay: Duration,
    interval_period: Duration,
    interval_count: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            values_delay: Duration::from_millis(500),
            interval_period: Duration::from_millis(200),
            interval_count: 5,
        }
    }
}

impl StoreConfig {
    /// Delay before [`EventStore::values`] emits.
    pub fn with_values_delay(mut self, delay: Duration) -> Self {
        self.values_delay = delay;
        self
    }

    /// Spacing of [`EventStore::interval`] ticks.
    pub fn with_interval_period(mut self, period: Duration) -> Self {
        self.interval_period = period;
        self
    }

    /// Number of [`EventStore::interval`] ticks before it completes.
    pub fn with_interval_count(mut self, count: u64) -> Self {
        self.interval_count = count;
        self
    }

    /// Delay before [`EventStore::values`] emits.
    pub fn values_delay(&self) -> Duration {
        self.values_delay
    }

    /// Spacing of [`EventStore::interval`] ticks.
    pub fn interval_period(&self) -> Duration {
        self.interval_period
    }

    /// Number of [`EventStore::interval`] ticks.
    pub fn interval_count(&self) -> u64 {
        self.interval_count
    }
}

#[derive(Debug)]
struct Inner<T> {
    last: Option<T>,
    listeners: Vec<mpsc::UnboundedSender<T>>,
}

/// Holds the most recent event and publishes every new one to its listeners.
///
/// Cloning the store clones the handle; all clones share one cell.
#[derive(Debug)]
pub struct EventStore<T = i64> {
    inner: Arc<Mutex<Inner<T>>>,
    config: StoreConfig,
}

impl<T> Clone for EventStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Clone + PartialEq> Default for EventStore<T> {
    fn default() -> Self {
        Self::with_config(StoreConfig::default())
    }
}

impl<T: Clone + PartialEq> EventStore<T> {
    /// Create an empty store with the default timings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with custom timings.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                last: None,
                listeners: Vec::new(),
            })),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The store's timings.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Record `value` as the last event and publish it to every listener.
    ///
    /// Listeners whose stream has been dropped are removed.
    pub fn emit(&self, value: T) {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner
            .listeners
            .retain(|listener| listener.unbounded_send(value.clone()).is_ok());

        let pruned = before - inner.listeners.len();
        if pruned > 0 {
            tracing::debug!(pruned, "removed closed event listeners");
        }
        tracing::trace!(listeners = inner.listeners.len(), "event emitted");
        inner.last = Some(value);
    }

    /// The most recently emitted event.
    pub fn last_event(&self) -> Option<T> {
        self.lock().last.clone()
    }

    /// Number of registered listeners, including ones dropped since the
    /// last [`emit`](Self::emit).
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Events emitted from now on, with consecutive duplicates suppressed.
    ///
    /// Earlier events are not replayed. The stream ends once every handle to
    /// the store has been dropped.
    pub fn event_stream(&self) -> impl Stream<Item = T> {
        let (tx, rx) = mpsc::unbounded();
        let mut inner = self.lock();
        inner.listeners.push(tx);
        tracing::debug!(listeners = inner.listeners.len(), "event listener registered");
        distinct_until_changed(rx)
    }

    /// `1` then `2`, both after the configured delay, then completion.
    pub fn values(&self) -> impl Stream<Item = i64> {
        delay_subscription(self.config.values_delay, stream::iter([1, 2]))
    }

    /// `0, 1, ...` one per configured period, completing with the last tick.
    pub fn interval(&self) -> impl Stream<Item = u64> {
        let count = usize::try_from(self.config.interval_count).unwrap_or(usize::MAX);
        interval(self.config.interval_period).take(count)
    }
}
