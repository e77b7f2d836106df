//! # Eddy
//!
//! > *A stream that fails circles back and tries again.*
//!
//! Retry-with-backoff for resubscribable streams, plus the small pieces needed
//! to show it off and to test it on a virtual clock.
//!
//! - [`retry`]: the operator. A failed subscription is dropped and, after
//!   `base * 2^attempt`, subscribed again; after three retries the original
//!   error reaches the consumer unchanged.
//! - [`source`]: [`Source`], a stream factory. Retrying means subscribing
//!   again, so the operator takes a factory rather than a single stream.
//! - [`ops`]: stream stages (`finalize`, `distinct_until_changed`, `concat_map`,
//!   `delay_subscription`, `interval`).
//! - [`store`]: [`EventStore`], a state-holding service exposing derived
//!   streams.
//! - [`testing`]: marble diagrams, cold sources and a recorder.
//!
//! ## Quick Example
//!
//! ```rust
//! use eddy::prelude::*;
//! use futures::{stream, StreamExt};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let flaky = from_fn(|| stream::iter(vec![Ok(1), Err("timeout")]));
//!
//! let results: Vec<_> = flaky
//!     .retry_exp_time(Duration::from_millis(1))
//!     .subscribe()
//!     .collect()
//!     .await;
//!
//! assert_eq!(results.len(), 5);
//! assert_eq!(results.last(), Some(&Err("timeout")));
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod ops;
pub mod retry;
pub mod source;
pub mod store;
pub mod testing;

// Re-exports
pub use retry::{retry_exp_time, PolicyError, RetryEvent, RetryPolicy, RetryWithBackoff};
pub use source::{from_fn, Source, SourceExt};
pub use store::{EventStore, StoreConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{retry_exp_time, PolicyError, RetryEvent, RetryPolicy, RetryWithBackoff};
    pub use crate::source::{from_fn, Source, SourceExt};
    pub use crate::store::{EventStore, StoreConfig};
}
