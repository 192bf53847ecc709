use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// Source of "now" for the rate limiter
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> Instant;
}

// Real monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can hand one clone to a
/// `RateLimiter` and keep another to advance it.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Instant>>,
}

impl MockClock {
    pub fn new(start: Instant) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut time = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *time += by;
    }

    pub fn set(&self, instant: Instant) {
        let mut time = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *time = instant;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
