//! Feeds an EventStore and prints its derived streams.
//!
//! Run with: cargo run --example event_store

use eddy::store::EventStore;
use futures::StreamExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let store = EventStore::<i64>::new();

    let listener = tokio::spawn({
        let events = store.event_stream();
        async move { events.collect::<Vec<_>>().await }
    });

    for value in [1, 1, 2, 3, 2, 2] {
        store.emit(value);
    }
    tracing::info!("last event: {:?}", store.last_event());

    let values: Vec<_> = store.values().collect().await;
    tracing::info!("values: {:?}", values);

    let ticks: Vec<_> = store.interval().collect().await;
    tracing::info!("interval: {:?}", ticks);

    drop(store);
    match listener.await {
        Ok(events) => tracing::info!("distinct events: {:?}", events),
        Err(e) => tracing::error!("listener task failed: {}", e),
    }
}
