//! Sequential flattening of fallible streams.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{ready, Stream};

/// Map every value of `stream` to an inner stream and play the inner streams
/// one after another.
///
/// The outer stream is drained as soon as it has items, even while an inner
/// stream is running: its values wait in a queue, and its completion is
/// observed on the frame it happens. The result completes once the outer
/// stream has completed and the last inner stream has ended. The first
/// `Err` from either side is yielded and ends the stream.
///
/// ```rust
/// use eddy::ops::concat_map;
/// use futures::{stream, StreamExt};
///
/// # tokio_test::block_on(async {
/// let outer = stream::iter(vec![Ok::<_, ()>(1), Ok(2)]);
/// let items: Vec<_> = concat_map(outer, |n| stream::iter(vec![Ok(n), Ok(n * 10)]))
///     .collect()
///     .await;
///
/// assert_eq!(items, vec![Ok(1), Ok(10), Ok(2), Ok(20)]);
/// # });
/// ```
pub fn concat_map<St, F, Inner, T, U, E>(stream: St, f: F) -> ConcatMap<St, F, Inner, T>
where
    St: Stream<Item = Result<T, E>>,
    F: FnMut(T) -> Inner,
    Inner: Stream<Item = Result<U, E>>,
{
    ConcatMap {
        outer: Some(Box::pin(stream)),
        queued: VecDeque::new(),
        inner: None,
        f,
        done: false,
    }
}

/// Stream returned by [`concat_map`].
#[must_use = "streams do nothing unless polled"]
pub struct ConcatMap<St, F, Inner, T> {
    outer: Option<Pin<Box<St>>>,
    queued: VecDeque<T>,
    inner: Option<Pin<Box<Inner>>>,
    f: F,
    done: bool,
}

// Neither `f` nor the queued values are ever pinned.
impl<St, F, Inner, T> Unpin for ConcatMap<St, F, Inner, T> {}

impl<St, F, Inner, T> ConcatMap<St, F, Inner, T> {
    fn finish(&mut self) {
        self.done = true;
        self.outer = None;
        self.inner = None;
        self.queued.clear();
    }
}

impl<St, F, Inner, T> fmt::Debug for ConcatMap<St, F, Inner, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcatMap")
            .field("outer_done", &self.outer.is_none())
            .field("queued", &self.queued.len())
            .field("inner_active", &self.inner.is_some())
            .field("done", &self.done)
            .finish()
    }
}

impl<St, F, Inner, T, U, E> Stream for ConcatMap<St, F, Inner, T>
where
    St: Stream<Item = Result<T, E>>,
    F: FnMut(T) -> Inner,
    Inner: Stream<Item = Result<U, E>>,
{
    type Item = Result<U, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            while let Some(outer) = this.outer.as_mut() {
                match outer.as_mut().poll_next(cx) {
                    Poll::Ready(Some(Ok(value))) => this.queued.push_back(value),
                    Poll::Ready(Some(Err(error))) => {
                        this.finish();
                        return Poll::Ready(Some(Err(error)));
                    }
                    Poll::Ready(None) => this.outer = None,
                    Poll::Pending => break,
                }
            }

            if let Some(inner) = this.inner.as_mut() {
                match ready!(inner.as_mut().poll_next(cx)) {
                    Some(Ok(item)) => return Poll::Ready(Some(Ok(item))),
                    Some(Err(error)) => {
                        this.finish();
                        return Poll::Ready(Some(Err(error)));
                    }
                    None => this.inner = None,
                }
                continue;
            }

            match this.queued.pop_front() {
                Some(value) => this.inner = Some(Box::pin((this.f)(value))),
                None if this.outer.is_none() => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                None => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use std::time::Duration;
    use tokio::time::{self, Instant};

    fn at(ms: u64, value: u32) -> impl Stream<Item = Result<u32, String>> {
        stream::once(async move {
            time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        })
    }

    #[tokio::test]
    async fn plays_inner_streams_in_order() {
        let outer = stream::iter(vec![Ok::<_, String>(1), Ok(2), Ok(3)]);
        let items: Vec<_> = concat_map(outer, |n| stream::iter(vec![Ok(n); n as usize]))
            .collect()
            .await;

        assert_eq!(items, vec![Ok(1), Ok(2), Ok(2), Ok(3), Ok(3), Ok(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn outer_values_queue_behind_a_running_inner() {
        let start = Instant::now();
        let outer = stream::iter(vec![Ok::<_, String>(10), Ok(20)]);
        let items: Vec<_> = concat_map(outer, |n| at(5, n))
            .map(|item| (item, start.elapsed()))
            .collect()
            .await;

        assert_eq!(
            items,
            vec![
                (Ok(10), Duration::from_millis(5)),
                (Ok(20), Duration::from_millis(10)),
            ]
        );
    }

    #[tokio::test]
    async fn outer_error_ends_the_stream_at_once() {
        let outer = stream::iter(vec![Ok(1), Err("outer".to_string()), Ok(2)]);
        let items: Vec<_> = concat_map(outer, |_| stream::pending::<Result<u32, String>>())
            .collect()
            .await;

        assert_eq!(items, vec![Err("outer".to_string())]);
    }

    #[tokio::test]
    async fn inner_error_drops_queued_values() {
        let outer = stream::iter(vec![Ok(1), Ok(2)]);
        let items: Vec<_> = concat_map(outer, |n| {
            stream::iter(vec![Ok::<u32, String>(n), Err(format!("inner {}", n))])
        })
        .collect()
        .await;

        assert_eq!(items, vec![Ok(1), Err("inner 1".to_string())]);
    }

    #[tokio::test]
    async fn empty_outer_completes() {
        let outer = stream::empty::<Result<u32, String>>();
        let items: Vec<_> = concat_map(outer, |n| stream::iter(vec![Ok::<u32, String>(n)]))
            .collect()
            .await;

        assert!(items.is_empty());
    }
}
