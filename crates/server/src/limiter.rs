use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    seen: Instant,
}

/// Per-client token buckets. Each client refills at `rate` tokens per
/// second up to `burst`, and every admitted request spends one token.
pub struct Limiter {
    rate: f64,
    burst: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl Limiter {
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            rate,
            burst: burst as f64,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.burst,
            seen: now,
        });
        let elapsed = now.saturating_duration_since(bucket.seen).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.seen = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Forgets clients idle for longer than `idle`. Returns how many were dropped.
    pub fn sweep(&self, now: Instant, idle: Duration) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.seen) <= idle);
        before - buckets.len()
    }

    /// Sweeps idle clients in the background for the life of the runtime.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sk_core::RATE_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                match self.sweep(Instant::now(), sk_core::RATE_IDLE_TIMEOUT) {
                    0 => {}
                    n => log::debug!("rate limiter dropped {} idle clients", n),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_reject() {
        let limiter = Limiter::new(1.0, 3);
        let now = Instant::now();
        assert!(limiter.allow("a", now));
        assert!(limiter.allow("a", now));
        assert!(limiter.allow("a", now));
        assert!(!limiter.allow("a", now));
    }
    #[test]
    fn refills_over_time() {
        let limiter = Limiter::new(2.0, 1);
        let now = Instant::now();
        assert!(limiter.allow("a", now));
        assert!(!limiter.allow("a", now));
        assert!(limiter.allow("a", now + Duration::from_millis(500)));
    }
    #[test]
    fn clients_are_independent() {
        let limiter = Limiter::new(1.0, 1);
        let now = Instant::now();
        assert!(limiter.allow("a", now));
        assert!(!limiter.allow("a", now));
        assert!(limiter.allow("b", now));
    }
    #[test]
    fn sweep_drops_idle_clients() {
        let limiter = Limiter::new(0.001, 1);
        let now = Instant::now();
        let later = now + Duration::from_secs(150);
        assert!(limiter.allow("old", now));
        assert!(limiter.allow("new", now + Duration::from_secs(120)));
        assert_eq!(limiter.sweep(later, Duration::from_secs(60)), 1);
        assert!(limiter.allow("old", later));
        assert!(!limiter.allow("new", later));
    }
}
