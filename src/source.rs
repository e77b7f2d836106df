//! Resubscribable stream sources.
//!
//! A [`Source`] is a stream *factory*: every call to [`Source::subscribe`]
//! re-executes the producing logic and returns a fresh stream. Retrying a
//! failed stream means subscribing again, so operators that retry take a
//! `Source` rather than a single stream.
//!
//! Streams produced by a source carry `Result<Item, Error>` items. An `Err`
//! item is the failure signal and ends the subscription; end-of-stream is
//! normal completion.
//!
//! # Example
//!
//! ```rust
//! use eddy::source::{from_fn, Source};
//! use futures::{stream, StreamExt};
//!
//! # tokio_test::block_on(async {
//! let numbers = from_fn(|| stream::iter(vec![Ok::<_, String>(1), Ok(2)]));
//!
//! // Each subscription replays the whole sequence.
//! let first: Vec<_> = numbers.subscribe().collect().await;
//! let second: Vec<_> = numbers.subscribe().collect().await;
//! assert_eq!(first, second);
//! # });
//! ```

use std::time::Duration;

use futures::Stream;

use crate::retry::{PolicyError, RetryPolicy, RetryWithBackoff};

/// A resubscribable stream of fallible values.
pub trait Source {
    /// Value type of a successful emission.
    type Item;
    /// Failure signal type.
    type Error;
    /// The stream produced by one subscription.
    type Stream: Stream<Item = Result<Self::Item, Self::Error>>;

    /// Start a new subscription.
    fn subscribe(&self) -> Self::Stream;
}

impl<S: Source + ?Sized> Source for &S {
    type Item = S::Item;
    type Error = S::Error;
    type Stream = S::Stream;

    fn subscribe(&self) -> Self::Stream {
        (**self).subscribe()
    }
}

impl<S: Source + ?Sized> Source for std::sync::Arc<S> {
    type Item = S::Item;
    type Error = S::Error;
    type Stream = S::Stream;

    fn subscribe(&self) -> Self::Stream {
        (**self).subscribe()
    }
}

/// A source built from a closure. Created by [`from_fn`].
#[derive(Clone)]
pub struct FromFn<F> {
    make_stream: F,
}

impl<F> std::fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

impl<F, St, T, E> Source for FromFn<F>
where
    F: Fn() -> St,
    St: Stream<Item = Result<T, E>>,
{
    type Item = T;
    type Error = E;
    type Stream = St;

    fn subscribe(&self) -> St {
        (self.make_stream)()
    }
}

/// Create a source that calls `make_stream` on every subscription.
pub fn from_fn<F, St, T, E>(make_stream: F) -> FromFn<F>
where
    F: Fn() -> St,
    St: Stream<Item = Result<T, E>>,
{
    FromFn { make_stream }
}

/// Extension methods for composing sources.
pub trait SourceExt: Source + Sized {
    /// Retry with the fixed exponential policy: delays of `base`, `2 * base`
    /// and `4 * base`, then the original failure is propagated.
    fn retry_exp_time(self, base: Duration) -> RetryWithBackoff<Self> {
        crate::retry::retry_exp_time(self, base)
    }

    /// Retry according to `policy`.
    ///
    /// Fails with [`PolicyError::Unbounded`] if the policy has no retry cap.
    fn retry_with_backoff(self, policy: RetryPolicy) -> Result<RetryWithBackoff<Self>, PolicyError> {
        RetryWithBackoff::new(self, policy)
    }
}

impl<S: Source> SourceExt for S {}
