//! HTTP client implementation for the MangaDex API.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{LibraryService, ListsService, MangaService, Report, Reporter, UsersService};
use crate::auth::{Session, TokenStore};
use crate::client::transport::Transport;
use crate::models::User;
use crate::{Error, Result};

use super::config::ClientConfig;

/// The main client for interacting with the MangaDex API.
///
/// The client owns the [`Session`] and hands it to every service; there is
/// no process-wide shared state. It must be created inside a Tokio runtime
/// (it spawns the telemetry drain task).
///
/// # Example
///
/// ```no_run
/// use mangadex_rs::{ClientConfig, MangadexClient};
///
/// # async fn example() -> mangadex_rs::Result<()> {
/// let client = MangadexClient::new(ClientConfig::default())?;
/// client.login("correct-horse-battery", Some("username"), None).await?;
///
/// let manga = client.manga().get(&"32d76d19-8a05-4db0-9fc2-e0b0648fe9d0".into()).await?;
/// println!("{}", manga.title().unwrap_or("<untitled>"));
/// # Ok(())
/// # }
/// ```
pub struct MangadexClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) transport: Transport,
    pub(crate) session: Session,
    pub(crate) config: ClientConfig,
    pub(crate) reporter: Reporter,
}

impl MangadexClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        let transport = Transport::new(http, config.retry.clone());

        let cache = TokenStore::open(config.cache_path.clone())?;
        let session = Session::new(transport.clone(), config.base_url.clone(), cache);
        let reporter = Reporter::spawn(transport.clone(), config.report_url.clone());

        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                session,
                config,
                reporter,
            }),
        })
    }

    /// Create a client with default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Get a reference to the session.
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Log in with a password and exactly one of username or email.
    ///
    /// This is a shorthand for [`Session::login`].
    pub async fn login(
        &self,
        password: &str,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<()> {
        self.inner.session.login(password, username, email).await
    }

    /// Restore a session from the persisted auth cache.
    pub async fn login_from_cache(&self) -> Result<()> {
        self.inner.session.login_from_cache().await
    }

    /// Log out and clear the held tokens.
    pub async fn logout(&self) -> Result<()> {
        self.inner.session.logout().await
    }

    /// Check whether the session is authenticated.
    pub async fn check_login(&self) -> Result<bool> {
        self.inner.session.check_login().await
    }

    /// The user fetched at login, if any.
    pub async fn current_user(&self) -> Option<User> {
        self.inner.session.current_user().await
    }

    /// Get the manga service.
    pub fn manga(&self) -> MangaService {
        MangaService::new(self.inner.clone())
    }

    /// Get the user-library service.
    pub fn library(&self) -> LibraryService {
        LibraryService::new(self.inner.clone())
    }

    /// Get the MangaDex-lists service.
    pub fn lists(&self) -> ListsService {
        ListsService::new(self.inner.clone())
    }

    /// Get the users service.
    pub fn users(&self) -> UsersService {
        UsersService::new(self.inner.clone())
    }

    /// Queue a best-effort image delivery report.
    ///
    /// Reports are drained by a background task and never block or fail the
    /// caller.
    pub fn report(&self, report: Report) {
        self.inner.reporter.submit(report);
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Full URL of a manga's cover image on the upload host, if the record
    /// included its cover art.
    pub fn cover_url(&self, manga: &crate::models::Manga) -> Option<String> {
        manga.cover_file_name().map(|file_name| {
            format!(
                "{}/covers/{}/{}",
                self.inner.config.uploads_url, manga.id, file_name
            )
        })
    }
}

impl ClientInner {
    /// Build and dispatch an authenticated request.
    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        query: Option<&[(String, String)]>,
    ) -> Result<reqwest::Response> {
        if self.config.auto_refresh_session {
            self.session.ensure_fresh().await?;
        }

        let url = format!("{}{}", self.config.base_url, path);
        let mut request = self.transport.http().request(method, &url);
        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(token) = self.session.bearer().await {
            request = request.bearer_auth(token.expose_secret());
        }

        self.transport.execute(request).await
    }

    /// Make a GET request.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(reqwest::Method::GET, path, None).await?;
        handle_response(response).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let response = self.request(reqwest::Method::GET, path, Some(query)).await?;
        handle_response(response).await
    }

    /// Make a POST request with a JSON body.
    #[allow(dead_code)]
    pub(crate) async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        if self.config.auto_refresh_session {
            self.session.ensure_fresh().await?;
        }

        let url = format!("{}{}", self.config.base_url, path);
        let mut request = self.transport.http().post(&url).json(body);
        if let Some(token) = self.session.bearer().await {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = self.transport.execute(request).await?;
        handle_response(response).await
    }
}

/// Decode a response, classifying the terminal statuses the transport hands
/// back unmodified.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.json().await?);
    }

    let status = status.as_u16();
    let body: serde_json::Value = response.json().await.unwrap_or_default();

    match status {
        401 => Err(Error::NotLoggedIn(Error::detail_from_body(&body))),
        404 => Err(Error::NotFound(Error::detail_from_body(&body))),
        _ => Err(Error::from_api_response(status, body)),
    }
}

impl Clone for MangadexClient {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for MangadexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MangadexClient")
            .field("config", &self.inner.config)
            .finish()
    }
}
