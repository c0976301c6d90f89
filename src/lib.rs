//! # mangadex-rs
//!
//! A production-grade Rust client for the MangaDex API.
//!
//! This crate provides the machinery a long-running catalog tool needs:
//! resilient request dispatch, unattended session lifetime management, and
//! lazy pagination over every list endpoint.
//!
//! ## Features
//!
//! - **Authentication**: username/email + password login, session restore
//!   from a persisted auth cache, and a background task that renews the
//!   session token before it expires
//! - **Resilience**: automatic retry of connection errors, rate limits
//!   (honoring the server's advertised delay), and server errors
//! - **Pagination**: one generic lazy `Stream` engine behind search, feeds,
//!   libraries, and lists
//! - **Type Safety**: explicit serde records and ID newtypes
//! - **Async-first**: built on Tokio and reqwest
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use mangadex_rs::{ClientConfig, MangadexClient};
//!
//! #[tokio::main]
//! async fn main() -> mangadex_rs::Result<()> {
//!     let client = MangadexClient::new(ClientConfig::default())?;
//!
//!     // Search the catalog; pages are fetched lazily as you iterate.
//!     let mut results = client.manga().search("one piece", false);
//!     while let Some(result) = results.next().await {
//!         let manga = result?;
//!         println!("{}", manga.title().unwrap_or("<untitled>"));
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Authenticated Use
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use mangadex_rs::models::ReadingStatus;
//! use mangadex_rs::{ClientConfig, MangadexClient};
//!
//! #[tokio::main]
//! async fn main() -> mangadex_rs::Result<()> {
//!     let config = ClientConfig::default()
//!         .with_cache_path("/home/me/.mangadex/auth.cache");
//!     let client = MangadexClient::new(config)?;
//!
//!     // Reuse a cached session when possible; fall back to a fresh login.
//!     client.login_from_cache().await?;
//!     if !client.check_login().await? {
//!         client.login("my-password", Some("my-username"), None).await?;
//!     }
//!
//!     // Stream the library, restricted to manga currently being read.
//!     let mut library = client
//!         .library()
//!         .manga(Some(ReadingStatus::Reading), false)
//!         .await?;
//!     while let Some(manga) = library.next().await {
//!         println!("{}", manga?.title().unwrap_or("<untitled>"));
//!     }
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod models;

// Re-export primary types at crate root for convenience
pub use api::Report;
pub use auth::{Credential, Session, TokenStore};
pub use client::{ClientConfig, MangadexClient, PaginatedStream, RetryConfig};
pub use error::{Error, Result};
pub use models::{ChapterId, ListId, MangaId, UserId};

/// Prelude module for convenient imports.
///
/// ```rust
/// use mangadex_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::api::{LibraryService, ListsService, MangaService, Report, UsersService};
    pub use crate::auth::{Credential, Session, TokenStore};
    pub use crate::client::{ClientConfig, MangadexClient, PaginatedStream, RetryConfig};
    pub use crate::error::{Error, Result};
    pub use crate::models::{
        Author, Chapter, ChapterId, ContentRating, ListId, LocalizedString, Manga, MangaId,
        MangaList, ReadingStatus, User, UserId,
    };
}
