//! Authentication and session lifecycle for the MangaDex API.
//!
//! [`Session`] owns the login/refresh/logout flow and the background
//! renewal task; [`TokenStore`] persists the token pair between runs.
//!
//! ```no_run
//! use mangadex_rs::{ClientConfig, MangadexClient};
//!
//! # async fn example() -> mangadex_rs::Result<()> {
//! let client = MangadexClient::new(ClientConfig::default())?;
//! client.session().login("hunter2-but-longer", Some("username"), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
mod session;

pub use cache::{Credential, TokenStore};
pub use session::Session;
