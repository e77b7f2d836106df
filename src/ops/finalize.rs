//! Run-once teardown for streams.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{ready, Stream};

/// A shareable cleanup action.
pub type FinalizeAction = Arc<dyn Fn() + Send + Sync>;

/// Fires a cleanup action at most once: on the first call to
/// [`Finalizer::fire`] or when dropped, whichever comes first.
pub(crate) struct Finalizer {
    stage: &'static str,
    action: Option<FinalizeAction>,
    armed: bool,
}

impl Finalizer {
    pub(crate) fn new(stage: &'static str, action: Option<FinalizeAction>) -> Self {
        Self {
            stage,
            action,
            armed: true,
        }
    }

    pub(crate) fn fire(&mut self) {
        if !std::mem::replace(&mut self.armed, false) {
            return;
        }
        tracing::debug!(stage = self.stage, "stream finalized");
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer")
            .field("stage", &self.stage)
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

/// Stream returned by [`finalize`].
pub struct Finalize<St> {
    inner: Pin<Box<St>>,
    finalizer: Finalizer,
}

impl<St> fmt::Debug for Finalize<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalize")
            .field("finalizer", &self.finalizer)
            .finish_non_exhaustive()
    }
}

impl<St: Stream> Stream for Finalize<St> {
    type Item = St::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = ready!(this.inner.as_mut().poll_next(cx));
        if item.is_none() {
            this.finalizer.fire();
        }
        Poll::Ready(item)
    }
}

/// Run `action` once when `stream` ends or is dropped.
///
/// ```rust
/// use eddy::ops::finalize;
/// use futures::{stream, StreamExt};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let done = Arc::new(AtomicBool::new(false));
/// let flag = done.clone();
/// let items: Vec<_> = finalize(stream::iter([1, 2]), move || flag.store(true, Ordering::SeqCst))
///     .collect()
///     .await;
///
/// assert_eq!(items, vec![1, 2]);
/// assert!(done.load(Ordering::SeqCst));
/// # });
/// ```
pub fn finalize<St, F>(stream: St, action: F) -> Finalize<St>
where
    St: Stream,
    F: Fn() + Send + Sync + 'static,
{
    Finalize {
        inner: Box::pin(stream),
        finalizer: Finalizer::new("finalize", Some(Arc::new(action))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let hook = {
            let count = count.clone();
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        (count, hook)
    }

    #[test]
    fn finalizer_fires_once() {
        let (count, hook) = counter();
        let mut finalizer = Finalizer::new("test", Some(Arc::new(hook)));

        finalizer.fire();
        finalizer.fire();
        drop(finalizer);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finalizer_fires_on_drop() {
        let (count, hook) = counter();
        drop(Finalizer::new("test", Some(Arc::new(hook))));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finalize_fires_at_end_of_stream() {
        let (count, hook) = counter();
        let mut stream = finalize(stream::iter([1]), hook);

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(stream.next().await, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        drop(stream);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finalize_fires_when_dropped_early() {
        let (count, hook) = counter();
        let mut stream = finalize(stream::iter([1, 2, 3]), hook);

        assert_eq!(stream.next().await, Some(1));
        drop(stream);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
