use rand::{thread_rng, Rng};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};

/// Token bucket: `per_second` new connections, refilled once a second, with
/// a short random pause after each launch to avoid bursts on the wire.
#[derive(Clone)]
pub struct RateLimiter {
    tokens: Arc<Semaphore>,
    per_second: u32,
    last_refill: Arc<Mutex<Instant>>,
    jitter_ms: Range<u64>,
}

impl RateLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            tokens: Arc::new(Semaphore::new(per_second as usize)),
            per_second,
            last_refill: Arc::new(Mutex::new(Instant::now())),
            jitter_ms: 5..20,
        }
    }

    pub fn with_jitter(mut self, jitter_ms: Range<u64>) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    /// Waits for a token. Tokens are consumed, not returned.
    pub async fn acquire(&self) {
        loop {
            self.refill().await;
            if let Ok(permit) = self.tokens.try_acquire() {
                permit.forget();
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn refill(&self) {
        let mut last = self.last_refill.lock().await;
        let now = Instant::now();
        if now.duration_since(*last) >= Duration::from_secs(1) {
            let missing = self
                .per_second
                .saturating_sub(self.tokens.available_permits() as u32);
            if missing > 0 {
                self.tokens.add_permits(missing as usize);
            }
            *last = now;
        }
    }

    pub async fn sleep_jitter(&self) {
        if self.jitter_ms.is_empty() {
            return;
        }
        let jitter = thread_rng().gen_range(self.jitter_ms.clone());
        sleep(Duration::from_millis(jitter)).await;
    }
}
