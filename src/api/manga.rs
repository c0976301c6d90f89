//! Manga lookup, search, and chapter feed.

use std::sync::Arc;

use crate::client::paginated::{PaginatedStream, PaginatedStreamBuilder};
use crate::client::ClientInner;
use crate::models::{Chapter, Manga, MangaId};
use crate::{Error, Result};

/// Reference records included with manga queries.
pub(crate) const MANGA_INCLUDES: [&str; 3] = ["author", "artist", "cover_art"];

/// Ratings served when adult content is not requested.
const SAFE_RATINGS: [&str; 2] = ["safe", "suggestive"];

/// Every rating the API knows.
pub(crate) const ALL_RATINGS: [&str; 4] = ["safe", "suggestive", "erotica", "pornographic"];

/// Chapters per feed page.
const FEED_PAGE_SIZE: i32 = 500;

/// Service for manga operations.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
///
/// # async fn example(client: mangadex_rs::MangadexClient) -> mangadex_rs::Result<()> {
/// let mut results = client.manga().search("berserk", false);
/// while let Some(manga) = results.next().await {
///     println!("{}", manga?.title().unwrap_or("<untitled>"));
/// }
/// # Ok(())
/// # }
/// ```
pub struct MangaService {
    inner: Arc<ClientInner>,
}

impl MangaService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Fetch a single manga with its authors, artists, and cover included.
    pub async fn get(&self, id: &MangaId) -> Result<Manga> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            data: Manga,
        }

        let query: Vec<(String, String)> = MANGA_INCLUDES
            .iter()
            .map(|inc| ("includes[]".to_string(), inc.to_string()))
            .collect();

        let envelope: Envelope = self
            .inner
            .get_with_query(&format!("/manga/{id}"), &query)
            .await
            .map_err(|err| match err {
                Error::NotFound(_) => Error::NotFound(format!("manga {id} cannot be found")),
                other => other,
            })?;
        Ok(envelope.data)
    }

    /// Search manga by title.
    ///
    /// Adult-rated results are excluded server-side unless `include_unsafe`
    /// is set.
    pub fn search(&self, title: &str, include_unsafe: bool) -> PaginatedStream<Manga> {
        let ratings: &[&str] = if include_unsafe {
            &ALL_RATINGS
        } else {
            &SAFE_RATINGS
        };

        PaginatedStreamBuilder::<Manga>::new(self.inner.clone(), "/manga")
            .param("title", title)
            .array_param("includes", MANGA_INCLUDES)
            .array_param("contentRating", ratings.iter().copied())
            .build()
    }

    /// Stream the chapter feed of a manga in the given language.
    ///
    /// Feed pages are large (500 chapters) and carry every content rating;
    /// rating decisions belong to whoever selected the manga.
    pub fn feed(&self, id: &MangaId, language: &str) -> PaginatedStream<Chapter> {
        PaginatedStreamBuilder::<Chapter>::new(self.inner.clone(), format!("/manga/{id}/feed"))
            .limit(FEED_PAGE_SIZE)
            .array_param("includes", ["scanlation_group", "user"])
            .array_param("contentRating", ALL_RATINGS)
            .array_param("translatedLanguage", [language])
            .build()
    }
}
