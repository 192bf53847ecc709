use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::clock::{Clock, SystemClock};
use crate::metrics::{RATE_LIMITED_TOTAL, RATE_LIMITER_KEYS, REQUEST_LATENCY, REQUEST_TOTAL};

pub const RATE_LIMIT_MESSAGE: &str = "rate limit exceeded, try again later";

/// Per-key sliding window rate limiter.
///
/// Every key gets its own list of admission timestamps, oldest first. A
/// timestamp counts toward the limit while it is strictly younger than
/// `window`. Expired timestamps are pruned lazily on the next check for
/// that key, whether the check admits or denies.
///
/// Keys stay in the map once seen; use [`RateLimiter::sweep`] (or
/// [`spawn_sweeper`]) to drop keys whose history has fully expired.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    visits: DashMap<String, Vec<Instant>>, // key -> admitted timestamps
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` requests per `window` for each key.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero or `window` is zero.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self::with_clock(limit, window, Arc::new(SystemClock))
    }

    /// Same as [`RateLimiter::new`], reading time from `clock`.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero or `window` is zero.
    pub fn with_clock(limit: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        assert!(limit > 0, "rate limit must be greater than zero");
        assert!(!window.is_zero(), "rate limit window must be greater than zero");

        Self {
            limit,
            window,
            visits: DashMap::new(),
            clock,
        }
    }

    /// Records a request from `key` and returns whether it is admitted.
    pub fn allow(&self, key: &str) -> bool {
        // the entry guard holds the shard lock until we return, so the
        // prune/count/push below is one atomic step for this key
        let mut visits = self.visits.entry(key.to_string()).or_default();

        // read the clock under the lock so each list stays in time order
        let now = self.clock.now();
        let window = self.window;
        visits.retain(|&t| now.saturating_duration_since(t) < window);

        // over limit, keep the pruned list and deny
        if visits.len() >= self.limit {
            return false;
        }

        visits.push(now);
        true
    }

    /// Drops every key whose timestamps have all expired. Returns how many
    /// keys were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let window = self.window;
        let before = self.visits.len();

        self.visits
            .retain(|_, visits| visits.iter().any(|&t| now.saturating_duration_since(t) < window));

        before.saturating_sub(self.visits.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.visits.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    #[cfg(test)]
    fn stored(&self, key: &str) -> Option<Vec<Instant>> {
        self.visits.get(key).map(|v| v.clone())
    }
}

// Periodically evict fully expired keys
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        tracing::info!(interval = ?every, "rate limiter sweeper started");

        loop {
            ticker.tick().await;

            let removed = limiter.sweep();
            RATE_LIMITER_KEYS.set(limiter.tracked_keys() as f64);
            if removed > 0 {
                tracing::debug!(removed, remaining = limiter.tracked_keys(), "swept idle clients");
            }
        }
    })
}

/// Turns a raw connection address into a limiter key by stripping the port.
///
/// `1.2.3.4:80` and `[::1]:80` lose their port; anything that is not a
/// `host:port` pair is returned unchanged.
pub fn client_key(raw: &str) -> String {
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }

    // bracketed host, e.g. an IPv6 literal with a zone
    if let Some(rest) = raw.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((host, _)) => host.to_string(),
            None => raw.to_string(),
        };
    }

    match raw.rsplit_once(':') {
        Some((host, _)) if !host.contains(':') => host.to_string(),
        _ => raw.to_string(),
    }
}

// Middleware in front of every route
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();

    let key = client_key(&addr.to_string());
    if !limiter.allow(&key) {
        RATE_LIMITED_TOTAL.inc();
        tracing::debug!(client = %key, "rate limit exceeded");
        return (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
    }

    let start_time = Instant::now();
    let response = next.run(request).await;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use std::thread;

    fn limiter(limit: usize, window: Duration) -> (RateLimiter, MockClock) {
        let clock = MockClock::new(Instant::now());
        let limiter = RateLimiter::with_clock(limit, window, Arc::new(clock.clone()));
        (limiter, clock)
    }

    #[test]
    fn test_admits_up_to_limit_within_window() {
        let (limiter, clock) = limiter(5, Duration::from_secs(60));

        for _ in 0..5 {
            assert!(limiter.allow("10.0.0.1"));
            clock.advance(Duration::from_millis(10));
        }
        assert!(!limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn test_sliding_window_scenario() {
        let (limiter, clock) = limiter(2, Duration::from_secs(1));
        let key = "1.2.3.4";
        let start = clock.now();
        let at = |ms: u64| start + Duration::from_millis(ms);

        assert!(limiter.allow(key)); // 0ms
        clock.set(at(100));
        assert!(limiter.allow(key));
        clock.set(at(200));
        assert!(!limiter.allow(key));
        clock.set(at(1050)); // 0ms entry expired
        assert!(limiter.allow(key));
        clock.set(at(1100)); // 100ms entry expired, exactly one window old
        assert!(limiter.allow(key));
        clock.set(at(1101));
        assert!(!limiter.allow(key));
    }

    #[test]
    fn test_partial_expiry_frees_one_slot() {
        let (limiter, clock) = limiter(2, Duration::from_secs(10));
        let start = clock.now();

        assert!(limiter.allow("a"));
        clock.set(start + Duration::from_secs(5));
        assert!(limiter.allow("a"));
        clock.set(start + Duration::from_millis(9_000));
        assert!(!limiter.allow("a"));

        clock.set(start + Duration::from_millis(10_100));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[test]
    fn test_timestamp_exactly_window_old_is_expired() {
        let (limiter, clock) = limiter(1, Duration::from_secs(1));

        assert!(limiter.allow("k"));
        clock.advance(Duration::from_millis(999));
        assert!(!limiter.allow("k"));
        clock.advance(Duration::from_millis(1));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1, Duration::from_secs(60));

        assert!(limiter.allow("A"));
        assert!(!limiter.allow("A"));
        assert!(limiter.allow("B"));
        assert!(!limiter.allow("B"));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_unseen_key_is_absent() {
        let (limiter, _clock) = limiter(3, Duration::from_secs(60));
        assert!(limiter.stored("nobody").is_none());
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_identical_limiters_agree() {
        let clock = MockClock::new(Instant::now());
        let a = RateLimiter::with_clock(3, Duration::from_secs(2), Arc::new(clock.clone()));
        let b = RateLimiter::with_clock(3, Duration::from_secs(2), Arc::new(clock.clone()));

        for step in 0..20u64 {
            let key = if step % 3 == 0 { "x" } else { "y" };
            assert_eq!(a.allow(key), b.allow(key), "diverged at step {step}");
            clock.advance(Duration::from_millis(250));
        }
    }

    #[test]
    fn test_denial_leaves_only_live_entries() {
        let (limiter, clock) = limiter(2, Duration::from_secs(1));
        let start = clock.now();

        assert!(limiter.allow("k"));
        clock.set(start + Duration::from_millis(600));
        assert!(limiter.allow("k"));
        clock.set(start + Duration::from_millis(900));
        assert!(!limiter.allow("k"));

        clock.set(start + Duration::from_millis(1300));
        assert!(limiter.allow("k"));
        clock.set(start + Duration::from_millis(1400));
        assert!(!limiter.allow("k"));

        let now = clock.now();
        let stored = limiter.stored("k").unwrap_or_default();
        assert_eq!(stored, vec![start + Duration::from_millis(600), start + Duration::from_millis(1300)]);
        assert!(stored.iter().all(|&t| now.duration_since(t) < Duration::from_secs(1)));
    }

    #[test]
    fn test_denied_traffic_does_not_grow_memory() {
        let (limiter, clock) = limiter(2, Duration::from_secs(1));

        for _ in 0..1_000 {
            limiter.allow("flood");
            clock.advance(Duration::from_millis(7));
        }
        let stored = limiter.stored("flood").unwrap_or_default();
        assert!(stored.len() <= 2);
        assert!(stored.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_concurrent_calls_never_over_admit() {
        let clock = MockClock::new(Instant::now());
        let limiter = Arc::new(RateLimiter::with_clock(
            25,
            Duration::from_secs(60),
            Arc::new(clock),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..50).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 25);
    }

    #[test]
    fn test_concurrent_calls_below_limit_all_admitted() {
        let limiter = Arc::new(RateLimiter::new(1_000, Duration::from_secs(60)));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..100).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 400);
    }

    #[test]
    fn test_sweep_removes_only_expired_keys() {
        let (limiter, clock) = limiter(2, Duration::from_secs(10));

        assert!(limiter.allow("old"));
        clock.advance(Duration::from_secs(8));
        assert!(limiter.allow("fresh"));
        clock.advance(Duration::from_secs(3));

        assert_eq!(limiter.sweep(), 1);
        assert!(limiter.stored("old").is_none());
        assert!(limiter.stored("fresh").is_some());
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_idle_keys_and_updates_gauge() {
        let (limiter, clock) = limiter(1, Duration::from_secs(10));
        let limiter = Arc::new(limiter);

        assert!(limiter.allow("idle"));
        clock.advance(Duration::from_secs(5));
        assert!(limiter.allow("active"));

        let sweeper = spawn_sweeper(Arc::clone(&limiter), Duration::from_secs(1));

        // first tick fires immediately, nothing has expired yet
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(RATE_LIMITER_KEYS.get(), 2.0);

        // idle is now 11s old, active 6s
        clock.advance(Duration::from_secs(6));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(limiter.stored("idle").is_none());
        assert_eq!(limiter.stored("active").map(|v| v.len()), Some(1));
        assert_eq!(RATE_LIMITER_KEYS.get(), 1.0);

        clock.advance(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(limiter.tracked_keys(), 0);
        assert_eq!(RATE_LIMITER_KEYS.get(), 0.0);

        sweeper.abort();
    }

    #[test]
    #[should_panic(expected = "rate limit must be greater than zero")]
    fn test_zero_limit_panics() {
        RateLimiter::new(0, Duration::from_secs(1));
    }

    #[test]
    #[should_panic(expected = "window must be greater than zero")]
    fn test_zero_window_panics() {
        RateLimiter::new(1, Duration::ZERO);
    }

    #[test]
    fn test_client_key_strips_port() {
        assert_eq!(client_key("1.2.3.4:5678"), "1.2.3.4");
        assert_eq!(client_key("[::1]:8080"), "::1");
        assert_eq!(client_key("[fe80::1%eth0]:80"), "fe80::1%eth0");
        assert_eq!(client_key("localhost:80"), "localhost");
    }

    #[test]
    fn test_client_key_falls_back_to_raw() {
        assert_eq!(client_key("1.2.3.4"), "1.2.3.4");
        assert_eq!(client_key("::1"), "::1");
        assert_eq!(client_key("[::1]"), "[::1]");
        assert_eq!(client_key("@unix"), "@unix");
    }
}
