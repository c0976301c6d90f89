//! Session management for MangaDex authentication.
//!
//! The session owns the credential pair, the auth cache, and the background
//! renewal task that keeps a long-lived session alive unattended.
//!
//! # Thread Safety
//!
//! `Session` is designed to be shared across tasks. Credential state is only
//! mutated under an internal lock, and the cache file is only touched
//! through the lock-guarded [`TokenStore`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::auth::cache::{token_expiry, TokenStore, EXPIRY_MARGIN_SECS};
use crate::client::transport::Transport;
use crate::models::User;
use crate::{Error, Result};

/// How long the renewal task waits after a transient refresh failure before
/// probing again.
const RENEW_RETRY: Duration = Duration::from_secs(30);

/// Authentication session for the MangaDex API.
///
/// Cheap to clone; clones share the same credential state.
#[derive(Clone)]
pub struct Session {
    shared: Arc<SessionShared>,
}

struct SessionShared {
    transport: Transport,
    base_url: String,
    cache: TokenStore,
    inner: RwLock<SessionInner>,
}

#[derive(Default)]
struct SessionInner {
    session_token: Option<SecretString>,
    session_exp: Option<DateTime<Utc>>,
    refresh_token: Option<SecretString>,
    refresh_exp: Option<DateTime<Utc>>,
    /// Tokens came from the persisted cache, not a live login in this
    /// process. Remote logout is skipped for such sessions because another
    /// process may still be using them.
    from_cache: bool,
    user: Option<User>,
    renew_stop: Option<watch::Sender<bool>>,
}

impl SessionInner {
    fn holds_tokens(&self) -> bool {
        self.session_token.is_some() || self.refresh_token.is_some()
    }

    fn clear_tokens(&mut self) {
        self.session_token = None;
        self.session_exp = None;
        self.refresh_token = None;
        self.refresh_exp = None;
        self.user = None;
        self.from_cache = false;
    }
}

impl Session {
    pub(crate) fn new(transport: Transport, base_url: impl Into<String>, cache: TokenStore) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                transport,
                base_url: base_url.into(),
                cache,
                inner: RwLock::new(SessionInner::default()),
            }),
        }
    }

    /// Log in with a password and exactly one of username or email.
    ///
    /// Credentials are validated locally before any network call: the
    /// password must be at least 8 characters and exactly one identifier
    /// must be supplied. On success both tokens are stored (and persisted,
    /// if caching is enabled), the renewal task is started, and the current
    /// user is fetched.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for bad input, [`Error::AlreadyLoggedIn`] if a
    /// session is already held, [`Error::LoginFailed`] if the server
    /// rejects the credentials (401).
    pub async fn login(
        &self,
        password: &str,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<()> {
        if password.len() < 8 {
            return Err(Error::Validation(
                "password must be at least 8 characters".into(),
            ));
        }
        let identifier = match (username, email) {
            (Some(username), None) => ("username", username),
            (None, Some(email)) => ("email", email),
            _ => {
                return Err(Error::Validation(
                    "provide exactly one of username or email".into(),
                ))
            }
        };

        if self.check_login().await? {
            return Err(Error::AlreadyLoggedIn("user is already logged in".into()));
        }

        info!("logging in to MangaDex");

        let url = format!("{}/auth/login", self.shared.base_url);
        let mut body = serde_json::json!({ "password": password });
        body[identifier.0] = serde_json::Value::String(identifier.1.to_string());
        let response = self
            .shared
            .transport
            .execute(self.shared.transport.http().post(&url).json(&body))
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let detail = Error::detail_from_body(&body);
            error!(%detail, "login rejected");
            return Err(Error::LoginFailed(detail));
        }
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(Error::from_api_response(status.as_u16(), body));
        }

        let envelope: AuthEnvelope = response.json().await?;
        self.adopt_tokens(&envelope.token.session, &envelope.token.refresh, false)
            .await?;
        self.start_renew_task().await;

        let user = self.fetch_current_user().await?;
        self.shared.inner.write().await.user = Some(user);

        info!("logged in to MangaDex");
        Ok(())
    }

    /// Restore a session from the persisted auth cache.
    ///
    /// If only the refresh token is still valid, the session token is
    /// renewed immediately. If nothing usable is cached this is a quiet
    /// no-op and the session stays logged out; callers must check
    /// [`check_login`](Self::check_login) afterwards. A session token
    /// without a refresh token is conservatively treated as not cached at
    /// all, since the session could never be renewed.
    pub async fn login_from_cache(&self) -> Result<()> {
        if self.check_login().await? {
            return Err(Error::AlreadyLoggedIn("user is already logged in".into()));
        }

        let session_token = self.shared.cache.session_token();
        let refresh_token = match self.shared.cache.refresh_token() {
            Some(token) => token,
            None => return Ok(()),
        };

        info!("logging in to MangaDex from cache");

        match session_token {
            None => {
                debug!("cached session token is expired, renewing");
                {
                    let mut inner = self.shared.inner.write().await;
                    inner.refresh_token = Some(SecretString::from(refresh_token.clone()));
                    inner.refresh_exp = Some(token_expiry(&refresh_token)?);
                    inner.from_cache = true;
                }
                self.refresh().await?;
            }
            Some(session_token) => {
                self.adopt_tokens(&session_token, &refresh_token, true).await?;
            }
        }

        self.start_renew_task().await;
        info!("logged in to MangaDex from cache");
        Ok(())
    }

    /// Exchange the refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// [`Error::NotLoggedIn`] if no refresh token is held (precondition
    /// violation); [`Error::LoginFailed`] if the server rejects the refresh
    /// token, in which case the session transitions to logged out and the
    /// renewal task is cancelled.
    pub async fn refresh(&self) -> Result<()> {
        let refresh_token = {
            let inner = self.shared.inner.read().await;
            inner
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string())
                .ok_or_else(|| Error::NotLoggedIn("no refresh token held".into()))?
        };

        let url = format!("{}/auth/refresh", self.shared.base_url);
        let body = serde_json::json!({ "token": refresh_token });
        let response = self
            .shared
            .transport
            .execute(self.shared.transport.http().post(&url).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let detail = Error::detail_from_body(&body);
            error!(%detail, "refresh token rejected, session is logged out");
            let mut inner = self.shared.inner.write().await;
            inner.clear_tokens();
            if let Some(stop) = inner.renew_stop.take() {
                let _ = stop.send(true);
            }
            return Err(Error::LoginFailed(detail));
        }

        let envelope: AuthEnvelope = response.json().await?;
        let from_cache = self.shared.inner.read().await.from_cache;
        self.adopt_tokens(&envelope.token.session, &envelope.token.refresh, from_cache)
            .await?;
        debug!("session token renewed");
        Ok(())
    }

    /// Check whether the session is authenticated.
    ///
    /// Returns `false` immediately when no tokens are held; otherwise asks
    /// the server. Never fails merely because the session is
    /// unauthenticated.
    pub async fn check_login(&self) -> Result<bool> {
        {
            let inner = self.shared.inner.read().await;
            if !inner.holds_tokens() {
                return Ok(false);
            }
        }

        let url = format!("{}/auth/check", self.shared.base_url);
        let mut request = self.shared.transport.http().get(&url);
        if let Some(token) = self.bearer().await {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = self.shared.transport.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(Error::from_api_response(status.as_u16(), body));
        }

        let check: CheckResponse = response.json().await?;
        Ok(check.is_authenticated)
    }

    /// Log out and clear the held tokens.
    ///
    /// A session restored from the persisted cache skips the remote call
    /// entirely and reports success, leaving the cached tokens intact for
    /// other processes.
    ///
    /// # Errors
    ///
    /// [`Error::NotLoggedIn`] if the session is not authenticated.
    pub async fn logout(&self) -> Result<()> {
        if !self.check_login().await? {
            return Err(Error::NotLoggedIn("user is not logged in".into()));
        }

        if self.shared.inner.read().await.from_cache {
            info!("session was restored from cache, skipping remote logout");
            return Ok(());
        }

        info!("logging out from MangaDex");

        let url = format!("{}/auth/logout", self.shared.base_url);
        let mut request = self.shared.transport.http().post(&url);
        if let Some(token) = self.bearer().await {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = self.shared.transport.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(Error::from_api_response(status.as_u16(), body));
        }

        let mut inner = self.shared.inner.write().await;
        inner.clear_tokens();
        if let Some(stop) = inner.renew_stop.take() {
            let _ = stop.send(true);
        }
        drop(inner);

        info!("logged out from MangaDex");
        Ok(())
    }

    /// The user fetched at login, if any.
    pub async fn current_user(&self) -> Option<User> {
        self.shared.inner.read().await.user.clone()
    }

    /// Check if the session token expires within the given buffer.
    pub async fn expires_within(&self, buffer: chrono::Duration) -> bool {
        let inner = self.shared.inner.read().await;
        match inner.session_exp {
            Some(exp) => Utc::now() + buffer >= exp,
            None => false,
        }
    }

    /// Refresh the session token if it is due to expire and a refresh token
    /// is available. Used by the authenticated surface before dispatch.
    pub(crate) async fn ensure_fresh(&self) -> Result<()> {
        let has_refresh = self.shared.inner.read().await.refresh_token.is_some();
        if has_refresh
            && self
                .expires_within(chrono::Duration::seconds(EXPIRY_MARGIN_SECS))
                .await
        {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Current bearer token, if one is held.
    pub(crate) async fn bearer(&self) -> Option<SecretString> {
        self.shared.inner.read().await.session_token.clone()
    }

    async fn fetch_current_user(&self) -> Result<User> {
        #[derive(Deserialize)]
        struct Envelope {
            data: User,
        }

        let url = format!("{}/user/me", self.shared.base_url);
        let mut request = self.shared.transport.http().get(&url);
        if let Some(token) = self.bearer().await {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = self.shared.transport.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(Error::from_api_response(status.as_u16(), body));
        }
        let envelope: Envelope = response.json().await?;
        Ok(envelope.data)
    }

    /// Store a fresh token pair in memory and in the cache.
    async fn adopt_tokens(&self, session: &str, refresh: &str, from_cache: bool) -> Result<()> {
        let session_exp = token_expiry(session)?;
        let refresh_exp = token_expiry(refresh)?;

        let mut inner = self.shared.inner.write().await;
        inner.session_token = Some(SecretString::from(session.to_string()));
        inner.session_exp = Some(session_exp);
        inner.refresh_token = Some(SecretString::from(refresh.to_string()));
        inner.refresh_exp = Some(refresh_exp);
        inner.from_cache = from_cache;
        drop(inner);

        self.shared.cache.set_tokens(session, refresh)
    }

    /// Start (or restart) the proactive renewal task.
    ///
    /// The task sleeps until shortly before the session token expires, then
    /// refreshes it, forever. Its only cancellation signal is logout; a
    /// transiently failing refresh is logged and retried rather than
    /// allowed to kill the watchdog.
    async fn start_renew_task(&self) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut inner = self.shared.inner.write().await;
        if let Some(previous) = inner.renew_stop.replace(stop_tx) {
            let _ = previous.send(true);
        }
        drop(inner);

        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(renew_loop(shared, stop_rx));
    }
}

/// Background renewal loop; races the expiry deadline against the logout
/// signal.
async fn renew_loop(shared: Weak<SessionShared>, mut stop: watch::Receiver<bool>) {
    loop {
        let deadline = {
            let Some(shared) = shared.upgrade() else { return };
            let inner = shared.inner.read().await;
            match inner.session_exp {
                Some(exp) => exp - chrono::Duration::seconds(EXPIRY_MARGIN_SECS),
                None => {
                    debug!("renewal task has no session to watch, stopping");
                    return;
                }
            }
        };

        let wait = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop.changed() => {
                debug!("renewal task cancelled");
                return;
            }
        }

        let session = match shared.upgrade() {
            Some(shared) => Session { shared },
            None => return,
        };
        match session.refresh().await {
            Ok(()) => info!("session token proactively renewed"),
            Err(Error::LoginFailed(detail)) => {
                error!(%detail, "proactive renewal rejected, renewal task stopping");
                return;
            }
            Err(err) => {
                warn!(error = %err, "proactive renewal failed, will retry");
                tokio::select! {
                    _ = tokio::time::sleep(RENEW_RETRY) => {}
                    _ = stop.changed() => return,
                }
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.shared.base_url)
            .field("session_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct AuthEnvelope {
    token: TokenPair,
}

#[derive(Debug, Deserialize)]
struct TokenPair {
    session: String,
    refresh: String,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(rename = "isAuthenticated")]
    is_authenticated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::config::RetryConfig;

    fn make_session() -> Session {
        let transport = Transport::new(reqwest::Client::new(), RetryConfig::default());
        Session::new(
            transport,
            "http://127.0.0.1:0",
            TokenStore::open(None).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_short_password_fails_without_network() {
        // The base URL is unroutable; reaching the network would error
        // differently, so a Validation error proves no call was made.
        let session = make_session();
        let err = session.login("short", Some("user"), None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_both_identifiers_rejected() {
        let session = make_session();
        let err = session
            .login("long-enough-password", Some("user"), Some("user@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_no_identifier_rejected() {
        let session = make_session();
        let err = session
            .login("long-enough-password", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_refresh_without_token_is_a_precondition_violation() {
        let session = make_session();
        let err = session.refresh().await.unwrap_err();
        assert!(matches!(err, Error::NotLoggedIn(_)));
    }

    #[tokio::test]
    async fn test_check_login_is_false_without_tokens() {
        let session = make_session();
        assert!(!session.check_login().await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_without_login_fails() {
        let session = make_session();
        let err = session.logout().await.unwrap_err();
        assert!(matches!(err, Error::NotLoggedIn(_)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let session = make_session();
        let debug = format!("{session:?}");
        assert!(debug.contains("REDACTED"));
    }
}
