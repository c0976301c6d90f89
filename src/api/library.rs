//! The authenticated user's library.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;

use crate::api::manga::MANGA_INCLUDES;
use crate::client::paginated::{PaginatedStream, PaginatedStreamBuilder};
use crate::client::ClientInner;
use crate::models::{Manga, MangaId, MangaList, ReadingStatus};
use crate::{Error, Result};

/// Service for the logged-in user's library.
///
/// Every operation here requires an authenticated session.
pub struct LibraryService {
    inner: Arc<ClientInner>,
}

impl LibraryService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Stream the manga the user follows.
    ///
    /// When `status` is given, the user's reading statuses are resolved
    /// once, up front, and manga outside that status are dropped from the
    /// stream. Adult-rated manga are dropped unless `include_unsafe` is set.
    pub async fn manga(
        &self,
        status: Option<ReadingStatus>,
        include_unsafe: bool,
    ) -> Result<PaginatedStream<Manga>> {
        self.require_login().await?;

        let allowed: Option<HashSet<MangaId>> = match status {
            Some(status) => Some(self.manga_ids_with_status(status).await?),
            None => None,
        };

        let stream = PaginatedStreamBuilder::<Manga>::new(self.inner.clone(), "/user/follows/manga")
            .array_param("includes", MANGA_INCLUDES)
            .build()
            .with_filter(move |manga: &Manga| {
                if !include_unsafe && manga.is_adult() {
                    return false;
                }
                allowed.as_ref().map_or(true, |ids| ids.contains(&manga.id))
            });

        Ok(stream)
    }

    /// Stream the user's own MangaDex lists.
    pub async fn lists(&self) -> Result<PaginatedStream<MangaList>> {
        self.require_login().await?;
        Ok(PaginatedStreamBuilder::<MangaList>::new(self.inner.clone(), "/user/list").build())
    }

    /// Stream the MangaDex lists the user follows.
    pub async fn followed_lists(&self) -> Result<PaginatedStream<MangaList>> {
        self.require_login().await?;
        Ok(
            PaginatedStreamBuilder::<MangaList>::new(self.inner.clone(), "/user/follows/list")
                .build(),
        )
    }

    /// The user's reading status for every manga in the library.
    pub async fn reading_statuses(&self) -> Result<HashMap<MangaId, ReadingStatus>> {
        self.require_login().await?;
        self.fetch_statuses().await
    }

    async fn require_login(&self) -> Result<()> {
        if self.inner.session.check_login().await? {
            Ok(())
        } else {
            Err(Error::NotLoggedIn(
                "retrieving the user library requires login".into(),
            ))
        }
    }

    async fn manga_ids_with_status(&self, status: ReadingStatus) -> Result<HashSet<MangaId>> {
        Ok(self
            .fetch_statuses()
            .await?
            .into_iter()
            .filter(|(_, s)| *s == status)
            .map(|(id, _)| id)
            .collect())
    }

    async fn fetch_statuses(&self) -> Result<HashMap<MangaId, ReadingStatus>> {
        #[derive(Deserialize)]
        struct Envelope {
            statuses: HashMap<MangaId, ReadingStatus>,
        }

        let envelope: Envelope = self.inner.get("/manga/status").await?;
        Ok(envelope.statuses)
    }
}
