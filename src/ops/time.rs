//! Timer-driven stream stages.

use std::time::Duration;

use futures::{stream, Stream, StreamExt};
use tokio::time::{self, Instant};

/// Whole milliseconds in `duration`, clamped to `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Emit `0, 1, 2, ...`, one value every `period`, the first one `period`
/// after the stream is first polled.
///
/// Ticks are scheduled against the first poll, so a slow consumer does not
/// shift later ticks. The stream never ends on its own; bound it with
/// [`StreamExt::take`].
pub fn interval(period: Duration) -> impl Stream<Item = u64> {
    stream::unfold(
        (None::<Instant>, 0u64),
        move |(origin, tick)| async move {
            let origin = origin.unwrap_or_else(Instant::now);
            let offset = period.checked_mul(u32::try_from(tick + 1).ok()?)?;
            time::sleep_until(origin + offset).await;
            Some((tick, (Some(origin), tick + 1)))
        },
    )
}

/// Wait `delay` after the first poll, then forward `stream` unchanged.
pub fn delay_subscription<St: Stream>(delay: Duration, stream: St) -> impl Stream<Item = St::Item> {
    stream::once(async move {
        time::sleep(delay).await;
        stream
    })
    .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_saturate_instead_of_wrapping() {
        assert_eq!(saturating_millis(Duration::from_micros(2_999)), 2);
        assert_eq!(saturating_millis(Duration::from_secs(u64::MAX)), u64::MAX);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticks_on_period_boundaries() {
        let start = Instant::now();
        let ticks: Vec<_> = interval(Duration::from_millis(200))
            .take(3)
            .map(|n| (n, start.elapsed()))
            .collect()
            .await;

        assert_eq!(
            ticks,
            vec![
                (0, Duration::from_millis(200)),
                (1, Duration::from_millis(400)),
                (2, Duration::from_millis(600)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interval_is_lazy() {
        let ticks = interval(Duration::from_millis(100));
        time::sleep(Duration::from_millis(1_000)).await;

        let start = Instant::now();
        let first = Box::pin(ticks).next().await;

        assert_eq!(first, Some(0));
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_subscription_shifts_the_whole_stream() {
        let start = Instant::now();
        let items: Vec<_> = delay_subscription(Duration::from_millis(500), stream::iter([1, 2]))
            .map(|n| (n, start.elapsed()))
            .collect()
            .await;

        assert_eq!(
            items,
            vec![(1, Duration::from_millis(500)), (2, Duration::from_millis(500))]
        );
    }
}
