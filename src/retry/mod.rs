//! Retry-with-backoff for resubscribable streams.
//!
//! The operator wraps a [`Source`](crate::source::Source). While a
//! subscription succeeds its values pass through untouched. When it fails, the
//! operator drops the failed subscription, waits for the delay given by its
//! [`RetryPolicy`], and subscribes again. Once the policy runs out of retries,
//! the source's error is handed to the consumer unchanged.
//!
//! ```text
//!  source:  -a--#
//!  result:  -a-- 20ms -a-- 40ms -a-- 80ms -a-- #     (base = 20ms)
//! ```
//!
//! - **Policy as data**: [`RetryPolicy`] only computes delays; the stream
//!   executes them.
//! - **One counter per subscription**: every `subscribe()` on the operator
//!   starts from attempt 0.
//! - **Cleanup once**: the operator's teardown runs exactly once per
//!   subscription, on completion, on the final failure, or when the stream is
//!   dropped. It runs before the consumer sees the terminal signal.
//!
//! # Quick Start
//!
//! ```rust
//! use eddy::source::{from_fn, Source, SourceExt};
//! use eddy::RetryPolicy;
//! use futures::{stream, StreamExt};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let source = from_fn(|| stream::iter(vec![Ok::<_, String>(42)]));
//!
//! let retried = source
//!     .retry_with_backoff(RetryPolicy::constant(Duration::from_millis(1)).with_max_retries(2))
//!     .unwrap()
//!     .on_retry(|event| println!("attempt {} failed: {}", event.attempt, event.error))
//!     .finally(|| println!("done"));
//!
//! let items: Vec<_> = retried.subscribe().collect().await;
//! assert_eq!(items, vec![Ok(42)]);
//! # });
//! ```

mod error;
mod policy;
mod stream;

pub use error::PolicyError;
pub use policy::{RetryEvent, RetryPolicy, RetryStrategy};
pub use stream::{retry_exp_time, RetryStream, RetryWithBackoff};
