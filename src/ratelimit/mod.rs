//! C3 — Rate Limiter / Host Governor. Per-host token buckets plus a
//! process-wide concurrency cap, generalizing the teacher's per-proxy
//! success/failure/latency tracking (`features::proxy_manager::ProxyManager`)
//! into a generic per-host governor (spec §4.3).
//!
//! The governor is process-wide and shared; each acquire is atomic (spec
//! §5). Acquire blocks cooperatively via `tokio::time::sleep` — never spins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock, Semaphore};

pub const RSS_HOST_RATE: f64 = 2.0;
pub const REDDIT_HOST_RATE: f64 = 1.0;
pub const AUTOCOMPLETE_HOST_RATE: f64 = 10.0;
pub const DEFAULT_COLLECTOR_CONCURRENCY: usize = 4;

pub const FEED_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const LLM_CALL_TIMEOUT: Duration = Duration::from_secs(60);

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate_per_sec: f64) -> Self {
        Self {
            capacity: rate_per_sec.max(1.0),
            tokens: rate_per_sec.max(1.0),
            refill_per_sec: rate_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Returns the wait duration needed before a token is available, or
    /// `None` if one is available now (and consumes it).
    fn try_acquire(&mut self) -> Option<Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - self.tokens;
            Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }
}

/// Per-host token buckets + a global per-collector concurrency semaphore.
pub struct HostGovernor {
    buckets: RwLock<HashMap<String, Arc<Mutex<TokenBucket>>>>,
    default_rate: f64,
    concurrency: Arc<Semaphore>,
}

impl HostGovernor {
    pub fn new(default_rate_per_sec: f64, max_concurrency: usize) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            default_rate: default_rate_per_sec,
            concurrency: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    async fn bucket_for(&self, host: &str) -> Arc<Mutex<TokenBucket>> {
        if let Some(b) = self.buckets.read().await.get(host) {
            return b.clone();
        }
        let mut write = self.buckets.write().await;
        write
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(self.default_rate))))
            .clone()
    }

    /// Cooperatively blocks until a token for `host` is available. Never
    /// spins: computes the deficit and sleeps exactly that long, then
    /// re-checks (another waiter may have taken the refilled token first).
    pub async fn acquire(&self, host: &str) {
        let bucket = self.bucket_for(host).await;
        loop {
            let wait = {
                let mut b = bucket.lock().await;
                b.try_acquire()
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }

    /// Acquire a process-wide concurrency slot for a collector run. Held for
    /// the lifetime of the returned guard.
    pub async fn concurrency_slot(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.concurrency
            .clone()
            .acquire_owned()
            .await
            .expect("host governor semaphore closed")
    }
}

/// Runs `fut` under a hard deadline. On elapse the call is abandoned and
/// `None` is returned — never an exception to the caller (spec §4.3). The
/// host's bucket is charged regardless, since `acquire` already happened
/// before this is called.
pub async fn with_timeout<F, T>(deadline: Duration, fut: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(?deadline, "external call exceeded deadline, abandoning");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_never_exceeds_rate_burst() {
        let governor = HostGovernor::new(1000.0, 4);
        for _ in 0..5 {
            governor.acquire("example.com").await;
        }
    }

    #[tokio::test]
    async fn concurrency_slot_limits_parallelism() {
        let governor = Arc::new(HostGovernor::new(1000.0, 2));
        let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let max_seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..6 {
            let governor = governor.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _permit = governor.concurrency_slot().await;
                let now = active.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, std::sync::atomic::Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(std::sync::atomic::Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn with_timeout_returns_none_on_elapse() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            42
        })
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn with_timeout_returns_some_when_fast_enough() {
        let result = with_timeout(Duration::from_millis(100), async { 42 }).await;
        assert_eq!(result, Some(42));
    }
}
