//! HTTP client, retrying transport, configuration, and pagination engine.

pub mod config;
mod http;
pub mod paginated;
pub(crate) mod transport;

pub use config::{ClientConfig, RetryConfig};
pub use http::MangadexClient;
pub use paginated::{ListEnvelope, PaginatedStream, DEFAULT_PAGE_SIZE, MAX_RESULTS};

pub(crate) use http::ClientInner;
