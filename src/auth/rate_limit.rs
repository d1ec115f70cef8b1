use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc, Duration};

use crate::config::RateLimitSettings;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub max_requests: u32,
    pub message: String,
    /// Hits that end in a successful response are released afterwards.
    pub skip_successful_requests: bool,
}

impl RateLimitConfig {
    pub fn login() -> Self {
        Self {
            window_size: Duration::minutes(15),
            max_requests: 5,
            message: "Too many login attempts, please try again later.".to_string(),
            skip_successful_requests: true,
        }
    }

    pub fn api() -> Self {
        Self {
            window_size: Duration::minutes(15),
            max_requests: 100,
            message: "Too many requests from this IP, please try again later.".to_string(),
            skip_successful_requests: false,
        }
    }

    pub fn login_from_settings(settings: &RateLimitSettings) -> Self {
        Self {
            window_size: Duration::minutes(settings.window_minutes),
            max_requests: settings.login_max_attempts,
            ..Self::login()
        }
    }

    pub fn api_from_settings(settings: &RateLimitSettings) -> Self {
        Self {
            window_size: Duration::minutes(settings.window_minutes),
            max_requests: settings.api_max_requests,
            ..Self::api()
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::api()
    }
}

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window has room again.
    pub reset_after_secs: u64,
    /// Timestamp recorded for this hit; `None` when rejected.
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_requests(&mut self, now: DateTime<Utc>, window_size: Duration) {
        let cutoff = now - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    fn add_request(&mut self, at: DateTime<Utc>) {
        self.timestamps.push(at);
    }

    fn remove_request(&mut self, at: DateTime<Utc>) -> bool {
        match self.timestamps.iter().position(|ts| *ts == at) {
            Some(index) => {
                self.timestamps.remove(index);
                true
            }
            None => false,
        }
    }

    fn request_count(&self) -> usize {
        self.timestamps.len()
    }

    fn reset_after(&self, now: DateTime<Utc>, window_size: Duration) -> u64 {
        let reset_at = match self.timestamps.first() {
            Some(oldest) => *oldest + window_size,
            None => now + window_size,
        };
        let millis = (reset_at - now).num_milliseconds().max(0) as u64;
        (millis + 999) / 1000
    }
}

/// Per-key sliding-window request counter.
///
/// Keys are client IP addresses. Clients sharing an address (NAT, proxies
/// without `trust_proxy`) share a bucket.
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, RequestWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub async fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Utc::now()).await
    }

    /// Prunes, counts and records under a single write guard.
    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut windows = self.windows.write().await;
        let window = windows.entry(key.to_string()).or_insert_with(RequestWindow::new);

        window.cleanup_old_requests(now, self.config.window_size);

        let limit = self.config.max_requests;
        if window.request_count() < limit as usize {
            window.add_request(now);
            RateLimitDecision {
                allowed: true,
                limit,
                remaining: limit.saturating_sub(window.request_count() as u32),
                reset_after_secs: window.reset_after(now, self.config.window_size),
                recorded_at: Some(now),
            }
        } else {
            RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_after_secs: window.reset_after(now, self.config.window_size),
                recorded_at: None,
            }
        }
    }

    /// Forgets a previously recorded hit.
    pub async fn release(&self, key: &str, recorded_at: DateTime<Utc>) -> bool {
        let mut windows = self.windows.write().await;
        windows
            .get_mut(key)
            .map(|window| window.remove_request(recorded_at))
            .unwrap_or(false)
    }

    pub async fn remaining(&self, key: &str) -> u32 {
        let now = Utc::now();
        let mut windows = self.windows.write().await;
        match windows.get_mut(key) {
            Some(window) => {
                window.cleanup_old_requests(now, self.config.window_size);
                self.config.max_requests.saturating_sub(window.request_count() as u32)
            }
            None => self.config.max_requests,
        }
    }

    pub async fn cleanup(&self) {
        self.cleanup_at(Utc::now()).await
    }

    pub async fn cleanup_at(&self, now: DateTime<Utc>) {
        let mut windows = self.windows.write().await;

        windows.retain(|_, window| {
            window.cleanup_old_requests(now, self.config.window_size);
            !window.timestamps.is_empty()
        });
    }

    #[cfg(test)]
    pub(crate) async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration as TokioDuration};

    #[tokio::test]
    async fn test_login_limit_allows_five_then_rejects() {
        let limiter = RateLimiter::new(RateLimitConfig::login());
        let start = Utc::now();

        for attempt in 0..5 {
            let decision = limiter.check_at("10.0.0.1", start + Duration::seconds(attempt)).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 4 - attempt as u32);
        }

        let rejected = limiter.check_at("10.0.0.1", start + Duration::seconds(10)).await;
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.recorded_at, None);
        assert_eq!(rejected.reset_after_secs, 15 * 60 - 10);

        let later = limiter.check_at("10.0.0.1", start + Duration::minutes(16)).await;
        assert!(later.allowed);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let mut config = RateLimitConfig::api();
        config.max_requests = 2;
        config.window_size = Duration::minutes(10);
        let limiter = RateLimiter::new(config);
        let start = Utc::now();

        assert!(limiter.check_at("ip", start).await.allowed);
        assert!(limiter.check_at("ip", start + Duration::minutes(5)).await.allowed);
        assert!(!limiter.check_at("ip", start + Duration::minutes(9)).await.allowed);
        // the first hit has aged out, the second has not
        assert!(limiter.check_at("ip", start + Duration::minutes(11)).await.allowed);
        assert!(!limiter.check_at("ip", start + Duration::minutes(12)).await.allowed);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let mut config = RateLimitConfig::login();
        config.max_requests = 1;
        let limiter = RateLimiter::new(config);

        assert!(limiter.check("1.1.1.1").await.allowed);
        assert!(!limiter.check("1.1.1.1").await.allowed);
        assert!(limiter.check("2.2.2.2").await.allowed);
    }

    #[tokio::test]
    async fn test_release_gives_the_slot_back() {
        let mut config = RateLimitConfig::login();
        config.max_requests = 1;
        let limiter = RateLimiter::new(config);

        let decision = limiter.check("ip").await;
        assert!(limiter.release("ip", decision.recorded_at.unwrap()).await);
        assert_eq!(limiter.remaining("ip").await, 1);
        assert!(limiter.check("ip").await.allowed);
        assert!(!limiter.release("other", Utc::now()).await);
    }

    #[tokio::test]
    async fn test_concurrent_checks_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::login()));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.check("shared").await.allowed }));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_windows() {
        let mut config = RateLimitConfig::api();
        // Use a shorter window for testing
        config.window_size = Duration::seconds(1);
        let limiter = RateLimiter::new(config);

        assert!(limiter.check("ip").await.allowed);
        assert_eq!(limiter.tracked_keys().await, 1);

        sleep(TokioDuration::from_millis(1100)).await;

        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }

    #[test]
    fn test_settings_presets() {
        let settings = RateLimitSettings {
            window_minutes: 30,
            login_max_attempts: 3,
            api_max_requests: 50,
        };

        let login = RateLimitConfig::login_from_settings(&settings);
        assert_eq!(login.max_requests, 3);
        assert_eq!(login.window_size, Duration::minutes(30));
        assert!(login.skip_successful_requests);

        let api = RateLimitConfig::api_from_settings(&settings);
        assert_eq!(api.max_requests, 50);
        assert!(!api.skip_successful_requests);
    }
}
