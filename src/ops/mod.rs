//! Small stream stages, several composed by the
//! [`EventStore`](crate::store::EventStore).
//!
//! Each stage is a plain function over [`futures::Stream`] holding only the
//! state it needs.

mod concat;
mod finalize;
mod time;

use std::future;

use futures::{Stream, StreamExt};

pub use concat::{concat_map, ConcatMap};
pub use finalize::{finalize, Finalize, FinalizeAction};
pub use time::{delay_subscription, interval};

pub(crate) use finalize::Finalizer;
pub(crate) use time::saturating_millis;

/// Suppress items equal to the previously emitted one.
///
/// ```rust
/// use eddy::ops::distinct_until_changed;
/// use futures::{stream, StreamExt};
///
/// # tokio_test::block_on(async {
/// let items: Vec<_> = distinct_until_changed(stream::iter([1, 1, 2, 3, 2, 2]))
///     .collect()
///     .await;
///
/// assert_eq!(items, vec![1, 2, 3, 2]);
/// # });
/// ```
pub fn distinct_until_changed<St>(stream: St) -> impl Stream<Item = St::Item>
where
    St: Stream,
    St::Item: PartialEq + Clone,
{
    let mut last: Option<St::Item> = None;
    stream.filter(move |item| {
        let fresh = last.as_ref() != Some(item);
        if fresh {
            last = Some(item.clone());
        }
        future::ready(fresh)
    })
}
