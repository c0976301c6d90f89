//! Error types for the MangaDex API client.
//!
//! One enum covers every failure mode of the crate, from transport-level
//! problems to authentication rejections to cache corruption. Transient
//! classes (connection errors, 429, 5xx) are retried inside the transport
//! and only surface here once the attempt budget is exhausted.

use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for MangaDex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for all MangaDex API operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad caller input, rejected before any network call. Never retried.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Credentials or a token were rejected by the server. Never retried.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// The retry budget was exhausted on 429/5xx responses; `status` is the
    /// last status observed.
    #[error("server kept responding with status {status}")]
    Http {
        /// Last HTTP status observed before giving up
        status: u16,
    },

    /// The retry budget was exhausted on connection-level failures.
    #[error("unhandled network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The auth cache could not be read even after recovery attempts.
    #[error("auth cache unusable: {0}")]
    Persistence(String),

    /// An operation that requires an authenticated session was called
    /// without one.
    #[error("not logged in: {0}")]
    NotLoggedIn(String),

    /// A login was attempted on an already-authenticated session.
    #[error("already logged in: {0}")]
    AlreadyLoggedIn(String),

    /// The server violated the wire contract (e.g. a rate-limit response
    /// without a usable delay header).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Request construction or body decoding failed inside reqwest.
    #[error("http error: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API returned a non-retryable error response.
    #[error("api error: status={status}, message={message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Detail extracted from the error envelope
        message: String,
    },

    /// The requested resource does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Returns `true` if this error came out of an exhausted retry loop and
    /// the operation might succeed if repeated later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http { .. } | Error::Network(_))
    }

    /// Returns `true` if this is an authentication-related error.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::LoginFailed(_) | Error::NotLoggedIn(_) | Error::AlreadyLoggedIn(_)
        )
    }

    /// Extract the `errors[0].detail` field MangaDex puts in error bodies.
    pub(crate) fn detail_from_body(body: &Value) -> String {
        body.get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("detail"))
            .and_then(|d| d.as_str())
            .unwrap_or("unknown API error")
            .to_string()
    }

    /// Create an API error from a non-2xx response body.
    pub(crate) fn from_api_response(status: u16, body: Value) -> Self {
        Error::Api {
            status,
            message: Self::detail_from_body(&body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Http { status: 502 }.is_transient());
        assert!(!Error::Validation("bad".into()).is_transient());
        assert!(!Error::LoginFailed("nope".into()).is_transient());
    }

    #[test]
    fn test_auth_classification() {
        assert!(Error::NotLoggedIn("x".into()).is_auth_error());
        assert!(Error::AlreadyLoggedIn("x".into()).is_auth_error());
        assert!(!Error::Protocol("x".into()).is_auth_error());
    }

    #[test]
    fn test_from_api_response() {
        let body = serde_json::json!({
            "result": "error",
            "errors": [{"status": 400, "detail": "Bad request body"}]
        });

        match Error::from_api_response(400, body) {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad request body");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_detail_fallback_on_malformed_body() {
        let body = serde_json::json!({"result": "error"});
        assert_eq!(Error::detail_from_body(&body), "unknown API error");
    }
}
