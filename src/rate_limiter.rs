use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Process-wide throttle for outbound provider requests.
///
/// The provider's usage policy caps request frequency per client, no matter
/// which logical batch issues the request, so the "time of last request" is
/// one shared value behind a mutex rather than per-task state. The lock is
/// held across the sleep, which serializes concurrent callers into a single
/// effective request stream.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Blocks the caller until at least `min_interval` has elapsed since the
    /// previous acquire returned.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_acquire_does_not_wait() {
        let limiter = RateLimiter::from_millis(500);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn consecutive_acquires_respect_min_interval() {
        let limiter = RateLimiter::from_millis(50);
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn concurrent_acquires_are_serialized() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::from_millis(30));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            }));
        }
        let mut times: Vec<Instant> = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(29));
        }
        // Three callers, two enforced gaps
        assert!(start.elapsed() >= Duration::from_millis(59));
    }
}
