//! Retries a flaky source with exponential backoff and prints what happens.
//!
//! Run with: cargo run --example retry_marbles

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eddy::prelude::*;
use futures::{stream, StreamExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Fails twice, then succeeds.
    let calls = Arc::new(AtomicU32::new(0));
    let flaky = from_fn({
        let calls = calls.clone();
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let items = if call < 2 {
                vec![Ok(call), Err(format!("connection reset on call {}", call))]
            } else {
                vec![Ok(call), Ok(call * 10)]
            };
            stream::iter(items)
        }
    });

    let retried = flaky
        .retry_exp_time(Duration::from_millis(50))
        .on_retry(|event| {
            tracing::info!(
                attempt = event.attempt,
                next_delay = ?event.next_delay,
                "attempt failed: {}",
                event.error
            );
        })
        .finally(|| tracing::info!("We are done!"));

    let mut results = retried.subscribe();
    while let Some(item) = results.next().await {
        match item {
            Ok(value) => tracing::info!("value: {}", value),
            Err(e) => tracing::error!("gave up: {}", e),
        }
    }

    // A source that never recovers surfaces its own error after 3 retries.
    let broken = from_fn(|| stream::iter(vec![Err::<u32, _>("service unavailable")]));
    let outcome: Vec<_> = broken
        .retry_exp_time(Duration::from_millis(10))
        .subscribe()
        .collect()
        .await;
    tracing::info!("broken source ended with {:?}", outcome);
}
