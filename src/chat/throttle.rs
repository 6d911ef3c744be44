//! Minimum spacing between outbound completion requests.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Shared gate that keeps outbound calls at least `min_interval` apart.
///
/// One instance is shared by every caller in the process. The lock is held across the
/// spacing sleep, so concurrent callers queue behind each other instead of racing on the
/// last-call instant.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Create a throttle with no recorded calls.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Configured spacing between calls.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next call is allowed, then record it as sent now.
    ///
    /// Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        let mut last_call = self.last_call.lock().await;
        let waited = match *last_call {
            Some(previous) => self.min_interval.saturating_sub(previous.elapsed()),
            None => Duration::ZERO,
        };
        if !waited.is_zero() {
            tracing::debug!(wait_ms = waited.as_millis() as u64, "Throttling outbound request");
            sleep(waited).await;
        }
        *last_call = Some(Instant::now());
        waited
    }

    /// Record a call as sent now without waiting.
    ///
    /// Retries inside one request use this so their own backoff is not stretched by the
    /// spacing, while later requests still measure from the latest attempt.
    pub async fn stamp(&self) {
        *self.last_call.lock().await = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_not_delayed() {
        let throttle = Throttle::new(Duration::from_millis(1500));
        assert_eq!(throttle.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_calls_are_spaced() {
        let throttle = Throttle::new(Duration::from_millis(1500));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_counts_toward_interval() {
        let throttle = Throttle::new(Duration::from_millis(1500));
        throttle.acquire().await;
        sleep(Duration::from_millis(1000)).await;
        let waited = throttle.acquire().await;
        assert_eq!(waited, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn stamp_moves_the_reference_point_without_waiting() {
        let throttle = Throttle::new(Duration::from_millis(1500));
        throttle.acquire().await;
        let start = Instant::now();
        throttle.stamp().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        sleep(Duration::from_millis(1000)).await;
        throttle.stamp().await;
        assert_eq!(throttle.acquire().await, Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_serialized() {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(1500)));
        let start = Instant::now();
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                tokio::spawn(async move {
                    throttle.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut stamps = Vec::new();
        for task in tasks {
            stamps.push(task.await.expect("task"));
        }
        stamps.sort();

        assert!(stamps[1] - stamps[0] >= Duration::from_millis(1500));
        assert!(stamps[2] - stamps[1] >= Duration::from_millis(1500));
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }
}
