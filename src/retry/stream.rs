//! The retry-with-backoff operator.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{ready, Stream};
use tokio::time::{self, Instant, Sleep};

use crate::ops::{saturating_millis, FinalizeAction, Finalizer};
use crate::retry::{PolicyError, RetryEvent, RetryPolicy};
use crate::source::Source;

type RetryHook<E> = Arc<dyn Fn(&RetryEvent<'_, E>) + Send + Sync>;

/// Retry `source` with delays of `base`, `2 * base` and `4 * base`.
///
/// After the third retry fails the source's error is yielded unchanged and
/// the stream ends. Completion is never retried.
///
/// # Example
///
/// ```rust
/// use eddy::retry::retry_exp_time;
/// use eddy::source::{from_fn, Source};
/// use futures::{stream, StreamExt};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let failing = from_fn(|| stream::iter(vec![Ok('a'), Err("boom")]));
/// let items: Vec<_> = retry_exp_time(failing, Duration::from_millis(1))
///     .subscribe()
///     .collect()
///     .await;
///
/// // 1 initial subscription + 3 retries, then the original error
/// assert_eq!(items, vec![Ok('a'), Ok('a'), Ok('a'), Ok('a'), Err("boom")]);
/// # });
/// ```
pub fn retry_exp_time<S: Source>(source: S, base: Duration) -> RetryWithBackoff<S> {
    RetryWithBackoff {
        source: Arc::new(source),
        policy: RetryPolicy::exponential(base).with_max_retries(3),
        on_retry: None,
        finally: None,
    }
}

/// A source that resubscribes to its inner source after failures.
///
/// Each [`subscribe`](Source::subscribe) starts a separate lifecycle with its
/// own attempt counter and its own cleanup.
pub struct RetryWithBackoff<S: Source> {
    source: Arc<S>,
    policy: RetryPolicy,
    on_retry: Option<RetryHook<S::Error>>,
    finally: Option<FinalizeAction>,
}

impl<S: Source> RetryWithBackoff<S> {
    /// Wrap `source` with an arbitrary bounded policy.
    pub fn new(source: S, policy: RetryPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            source: Arc::new(source),
            policy,
            on_retry: None,
            finally: None,
        })
    }

    /// Call `hook` on every failure, including the final one.
    pub fn on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RetryEvent<'_, S::Error>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Run `action` once per subscription, when it completes, fails for good
    /// or is dropped.
    pub fn finally<F>(mut self, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.finally = Some(Arc::new(action));
        self
    }

    /// The policy driving the delays.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<S: Source> Clone for RetryWithBackoff<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            policy: self.policy.clone(),
            on_retry: self.on_retry.clone(),
            finally: self.finally.clone(),
        }
    }
}

impl<S: Source> fmt::Debug for RetryWithBackoff<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryWithBackoff")
            .field("policy", &self.policy)
            .field("on_retry", &self.on_retry.is_some())
            .field("finally", &self.finally.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: Source> Source for RetryWithBackoff<S> {
    type Item = S::Item;
    type Error = S::Error;
    type Stream = RetryStream<S>;

    fn subscribe(&self) -> RetryStream<S> {
        RetryStream {
            state: State::Idle,
            source: self.source.clone(),
            policy: self.policy.clone(),
            attempt: 0,
            started: None,
            on_retry: self.on_retry.clone(),
            finalizer: Finalizer::new("retry_with_backoff", self.finally.clone()),
        }
    }
}

enum State<St> {
    Idle,
    Active(Pin<Box<St>>),
    Waiting(Pin<Box<Sleep>>),
    Terminated,
}

/// One subscription lifecycle of [`RetryWithBackoff`].
///
/// Dropping the stream releases the in-flight subscription or pending timer
/// and then runs the cleanup, unless it already ran.
#[must_use = "streams do nothing unless polled"]
pub struct RetryStream<S: Source> {
    // dropped before `finalizer`
    state: State<S::Stream>,
    source: Arc<S>,
    policy: RetryPolicy,
    attempt: u32,
    started: Option<Instant>,
    on_retry: Option<RetryHook<S::Error>>,
    finalizer: Finalizer,
}

impl<S: Source> RetryStream<S> {
    /// Number of retries performed so far.
    pub fn retries(&self) -> u32 {
        self.attempt
    }

    /// Whether a terminal signal has been produced.
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, State::Terminated)
    }

    fn subscribe_source(&mut self) {
        self.state = State::Active(Box::pin(self.source.subscribe()));
    }

    fn terminate(&mut self) {
        self.state = State::Terminated;
        self.finalizer.fire();
    }
}

impl<S: Source> Stream for RetryStream<S> {
    type Item = Result<S::Item, S::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                State::Idle => {
                    this.started = Some(Instant::now());
                    this.subscribe_source();
                }
                State::Active(inner) => match ready!(inner.as_mut().poll_next(cx)) {
                    Some(Ok(value)) => return Poll::Ready(Some(Ok(value))),
                    Some(Err(error)) => {
                        let next_delay = this.policy.delay_for_attempt(this.attempt);
                        if let Some(hook) = &this.on_retry {
                            hook(&RetryEvent {
                                attempt: this.attempt + 1,
                                error: &error,
                                next_delay,
                                elapsed: this.started.map(|t| t.elapsed()).unwrap_or_default(),
                            });
                        }

                        match next_delay {
                            Some(delay) => {
                                tracing::debug!(
                                    attempt = this.attempt + 1,
                                    delay_ms = saturating_millis(delay),
                                    "source failed, scheduling resubscription"
                                );
                                // Replacing the state drops the failed subscription.
                                this.state = State::Waiting(Box::pin(time::sleep(delay)));
                            }
                            None => {
                                tracing::warn!(
                                    attempts = this.attempt + 1,
                                    "retries exhausted, propagating failure"
                                );
                                this.terminate();
                                return Poll::Ready(Some(Err(error)));
                            }
                        }
                    }
                    None => {
                        this.terminate();
                        return Poll::Ready(None);
                    }
                },
                State::Waiting(delay) => {
                    ready!(delay.as_mut().poll(cx));
                    this.attempt += 1;
                    this.subscribe_source();
                }
                State::Terminated => return Poll::Ready(None),
            }
        }
    }
}

impl<S: Source> fmt::Debug for RetryStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Idle => "idle",
            State::Active(_) => "active",
            State::Waiting(_) => "waiting",
            State::Terminated => "terminated",
        };
        f.debug_struct("RetryStream")
            .field("state", &state)
            .field("attempt", &self.attempt)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
