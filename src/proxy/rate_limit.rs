use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

fn window_end(now: u64, window: Duration) -> u64 {
    now.saturating_add(u64::try_from(window.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub count: u32,
    pub reset_at: u64,
}

/// Fixed-window counters keyed by `endpoint:client`. In-process only.
pub struct RateLimiter {
    windows: DashMap<String, RateLimitWindow>,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// Counts one request against `key`. Returns false once `limit` requests
    /// have been accepted in the current window; rejected requests are not counted.
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> bool {
        let now = self.clock.now_millis();
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(RateLimitWindow {
                count: 0,
                reset_at: window_end(now, window),
            });
        if entry.reset_at <= now {
            *entry = RateLimitWindow {
                count: 0,
                reset_at: window_end(now, window),
            };
        }
        if entry.count >= limit {
            return false;
        }
        entry.count += 1;
        true
    }

    pub fn window(&self, key: &str) -> Option<RateLimitWindow> {
        self.windows.get(key).map(|w| *w)
    }

    /// Drops every window whose reset time has passed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.windows.len();
        self.windows.retain(|_, w| w.reset_at > now);
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!("Purged {} expired rate-limit windows", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                limiter.purge_expired();
            }
        })
    }
}
