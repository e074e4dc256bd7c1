//! Configuration for the sync engine.

use std::time::Duration;

/// Path of the bulk endpoint relative to the collector base URL.
const BULK_PATH: &str = "/api/tracking/bulk-sync";
/// Path of the single-window endpoint relative to the collector base URL.
const SINGLE_PATH: &str = "/api/tracking/sync";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Bulk endpoint receiving the whole backlog.
    pub bulk_url: String,
    /// Single endpoint receiving the current window.
    pub single_url: String,
    /// Known-good host used as a reachability probe.
    pub connectivity_url: String,
    /// Timeout applied to every request, probe included.
    pub request_timeout: Duration,
    /// Rollover threshold in ticks; also the fixed `active_time` sent upstream.
    pub window_size: u32,
    /// Period of the standalone scheduled flush.
    pub sync_interval: Duration,
    /// Retry policy applied by the scheduler to failed scheduled flushes.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration for a collector at `base_url`.
    ///
    /// Endpoint paths are appended to the base URL; a trailing slash is
    /// tolerated.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let base = base_url.as_ref().trim_end_matches('/');
        Self {
            bulk_url: format!("{base}{BULK_PATH}"),
            single_url: format!("{base}{SINGLE_PATH}"),
            connectivity_url: "https://clients3.google.com/generate_204".to_string(),
            request_timeout: Duration::from_secs(5),
            window_size: 5,
            sync_interval: Duration::from_secs(20 * 60),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the bulk endpoint URL.
    pub fn with_bulk_url(mut self, url: impl Into<String>) -> Self {
        self.bulk_url = url.into();
        self
    }

    /// Sets the single-window endpoint URL.
    pub fn with_single_url(mut self, url: impl Into<String>) -> Self {
        self.single_url = url.into();
        self
    }

    /// Sets the connectivity probe URL.
    pub fn with_connectivity_url(mut self, url: impl Into<String>) -> Self {
        self.connectivity_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the window size.
    pub fn with_window_size(mut self, ticks: u32) -> Self {
        self.window_size = ticks;
        self
    }

    /// Sets the standalone sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.add_jitter = jitter;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = delay_secs * 0.25 * rand_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Cheap pseudo-random jitter in `[0, 1)` from the clock's sub-second nanos.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builds_endpoints_from_base() {
        let config = SyncConfig::new("https://collector.example.com/");
        assert_eq!(
            config.bulk_url,
            "https://collector.example.com/api/tracking/bulk-sync"
        );
        assert_eq!(
            config.single_url,
            "https://collector.example.com/api/tracking/sync"
        );
        assert_eq!(config.window_size, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.sync_interval, Duration::from_secs(1200));
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::default()
            .with_bulk_url("http://a/bulk")
            .with_single_url("http://a/one")
            .with_connectivity_url("http://a/ping")
            .with_window_size(10)
            .with_timeout(Duration::from_secs(2));

        assert_eq!(config.bulk_url, "http://a/bulk");
        assert_eq!(config.single_url, "http://a/one");
        assert_eq!(config.connectivity_url, "http://a/ping");
        assert_eq!(config.window_size, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn retry_config_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        // jitter adds at most 25%
        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
    }

    #[test]
    fn retry_delay_without_jitter_is_exact() {
        let config = RetryConfig::new(4)
            .with_initial_delay(Duration::from_millis(50))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(50));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(200));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        let delay = config.delay_for_attempt(5);
        assert!(delay <= Duration::from_millis(6250));
    }
}
