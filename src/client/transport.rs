//! Retrying transport underneath every physical request.
//!
//! The transport owns the retry policy of the crate: connection failures are
//! retried immediately, rate-limited responses sleep for the exact delay the
//! server advertises, and server errors retry with an optional backoff. Any
//! other response is handed back unmodified for the caller to classify.
//! Backoff sleeps are local to the calling task; concurrent requests each
//! run their own loop.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::{info, warn};

use crate::client::config::RetryConfig;
use crate::{Error, Result};

/// Rate-limit header carrying an absolute epoch-seconds reset time.
const RATELIMIT_RETRY_AFTER: &str = "x-ratelimit-retry-after";

/// Shared retrying HTTP transport.
///
/// Cheap to clone; all clones share the underlying connection pool.
#[derive(Clone)]
pub(crate) struct Transport {
    http: reqwest::Client,
    retry: RetryConfig,
}

impl Transport {
    pub(crate) fn new(http: reqwest::Client, retry: RetryConfig) -> Self {
        Self { http, retry }
    }

    /// Access the underlying `reqwest` client for request building.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Dispatch a request, retrying transient failures.
    ///
    /// Makes up to `retry.max_attempts` attempts. Responses other than 429
    /// and 5xx are returned as-is, including 4xx. Once the budget is
    /// exhausted the last observed status becomes [`Error::Http`]; if every
    /// attempt failed at the connection level the result is
    /// [`Error::Network`].
    pub(crate) async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut last_status: Option<u16> = None;
        let mut last_connect_error: Option<reqwest::Error> = None;

        for attempt in 1..=self.retry.max_attempts {
            let req = request.try_clone().ok_or_else(|| {
                Error::Validation("request with a streaming body cannot be retried".into())
            })?;

            let response = match req.send().await {
                Ok(response) => response,
                Err(err) if err.is_connect() || err.is_timeout() => {
                    warn!(
                        url = %err.url().map(short_url).unwrap_or_default(),
                        error = %err,
                        attempt,
                        "failed to connect, retrying"
                    );
                    last_connect_error = Some(err);
                    continue;
                }
                Err(err) => return Err(Error::Request(err)),
            };

            let status = response.status();

            if status.as_u16() == 429 {
                let delay = rate_limit_delay(response.headers())?;
                info!(
                    delay_secs = delay.as_secs_f64(),
                    attempt,
                    "rate limited, sleeping until the window resets"
                );
                tokio::time::sleep(delay).await;
                last_status = Some(429);
                continue;
            }

            if status.is_server_error() {
                warn!(
                    url = %short_url(response.url()),
                    status = status.as_u16(),
                    attempt,
                    "server error, retrying"
                );
                last_status = Some(status.as_u16());
                let backoff = self.retry.backoff_for_attempt(attempt);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }

            return Ok(response);
        }

        match (last_status, last_connect_error) {
            (Some(status), _) => Err(Error::Http { status }),
            (None, Some(err)) => Err(Error::Network(err)),
            (None, None) => Err(Error::Protocol("no request attempts were made".into())),
        }
    }
}

/// Compute how long a 429 response asks us to wait.
///
/// `x-ratelimit-retry-after` carries an absolute epoch timestamp (MangaDex),
/// `Retry-After` a relative number of seconds (DDoS-Guard). A response that
/// advertises neither, or a delay that comes out negative or unparseable, is
/// a wire-contract violation and must not be retried.
fn rate_limit_delay(headers: &HeaderMap) -> Result<Duration> {
    if let Some(value) = headers.get(RATELIMIT_RETRY_AFTER) {
        let reset = parse_header_f64(value, RATELIMIT_RETRY_AFTER)?;
        let secs = reset - Utc::now().timestamp() as f64;
        return duration_from_secs(secs, RATELIMIT_RETRY_AFTER);
    }

    if let Some(value) = headers.get(RETRY_AFTER) {
        let secs = parse_header_f64(value, "Retry-After")?;
        return duration_from_secs(secs, "Retry-After");
    }

    Err(Error::Protocol(
        "rate limited without a retry delay header".into(),
    ))
}

fn parse_header_f64(value: &reqwest::header::HeaderValue, name: &str) -> Result<f64> {
    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| Error::Protocol(format!("unparseable {name} header")))
}

fn duration_from_secs(secs: f64, name: &str) -> Result<Duration> {
    if secs < 0.0 || !secs.is_finite() {
        return Err(Error::Protocol(format!(
            "{name} header advertised a negative delay"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Shorten a URL to scheme, host and path for log lines.
fn short_url(url: &url::Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_relative_retry_after() {
        let headers = headers_with("retry-after", "3");
        assert_eq!(rate_limit_delay(&headers).unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_absolute_reset_in_the_future() {
        let reset = Utc::now().timestamp() + 10;
        let headers = headers_with("x-ratelimit-retry-after", &reset.to_string());
        let delay = rate_limit_delay(&headers).unwrap();
        assert!(delay <= Duration::from_secs(10));
        assert!(delay >= Duration::from_secs(8));
    }

    #[test]
    fn test_absolute_reset_in_the_past_is_fatal() {
        let reset = Utc::now().timestamp() - 60;
        let headers = headers_with("x-ratelimit-retry-after", &reset.to_string());
        assert!(matches!(
            rate_limit_delay(&headers),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_missing_headers_are_fatal() {
        assert!(matches!(
            rate_limit_delay(&HeaderMap::new()),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_garbage_header_is_fatal() {
        let headers = headers_with("retry-after", "soon");
        assert!(matches!(
            rate_limit_delay(&headers),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_short_url_drops_query() {
        let url = url::Url::parse("https://api.mangadex.org/manga?title=x&limit=100").unwrap();
        assert_eq!(short_url(&url), "https://api.mangadex.org/manga");
    }
}
