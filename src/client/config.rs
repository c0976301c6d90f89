//! Client configuration options.

use std::path::PathBuf;
use std::time::Duration;

/// Production API host.
pub const BASE_URL: &str = "https://api.mangadex.org";
/// Production image host.
pub const UPLOADS_URL: &str = "https://uploads.mangadex.org";
/// MangaDex@Home network report endpoint.
pub const REPORT_URL: &str = "https://api.mangadex.network/report";

/// Configuration for the MangaDex client.
///
/// # Example
///
/// ```
/// use mangadex_rs::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_user_agent("my-app/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL
    pub base_url: String,
    /// Image server base URL
    pub uploads_url: String,
    /// Telemetry report endpoint
    pub report_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Where to persist the auth cache; `None` disables caching
    pub cache_path: Option<PathBuf>,
    /// Whether the authenticated surface refreshes a nearly-expired token
    /// before dispatching a request
    pub auto_refresh_session: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            uploads_url: UPLOADS_URL.to_string(),
            report_url: REPORT_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("mangadex-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
            retry: RetryConfig::default(),
            cache_path: None,
            auto_refresh_session: true,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the image server base URL.
    pub fn with_uploads_url(mut self, url: impl Into<String>) -> Self {
        self.uploads_url = url.into();
        self
    }

    /// Override the telemetry report endpoint.
    pub fn with_report_url(mut self, url: impl Into<String>) -> Self {
        self.report_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Persist login tokens to the given file.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Enable or disable the pre-request freshness check.
    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh_session = enabled;
        self
    }
}

/// Configuration for the transport retry loop.
///
/// Connection errors and server errors are retried immediately by default,
/// matching the upstream API's guidance; an exponential backoff for 5xx
/// responses can be opted into with [`with_initial_backoff`].
///
/// [`with_initial_backoff`]: RetryConfig::with_initial_backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts per logical request
    pub max_attempts: u32,
    /// First backoff applied to a 5xx retry; zero means immediate
    pub initial_backoff: Duration,
    /// Ceiling for the exponential backoff
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Enable exponential backoff for server errors, starting at `duration`.
    pub fn with_initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Set the backoff ceiling.
    pub fn with_max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Calculate the 5xx backoff for a given attempt (1-based).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let backoff_millis =
            self.initial_backoff.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1));
        let max_millis = self.max_backoff.as_millis() as u64;
        Duration::from_millis(backoff_millis.min(max_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.cache_path.is_none());
        assert!(config.auto_refresh_session);
    }

    #[test]
    fn test_default_retry_is_immediate() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.backoff_for_attempt(1), Duration::ZERO);
        assert_eq!(retry.backoff_for_attempt(4), Duration::ZERO);
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let retry = RetryConfig::default()
            .with_initial_backoff(Duration::from_millis(500))
            .with_max_backoff(Duration::from_secs(2));

        assert_eq!(retry.backoff_for_attempt(1), Duration::from_millis(500));
        assert_eq!(retry.backoff_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(retry.backoff_for_attempt(3), Duration::from_millis(2000));
        // 500 * 2^3 = 4000, capped
        assert_eq!(retry.backoff_for_attempt(4), Duration::from_secs(2));
    }
}
