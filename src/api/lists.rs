//! MangaDex lists and their member manga.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::api::manga::{ALL_RATINGS, MANGA_INCLUDES};
use crate::client::paginated::{ListEnvelope, PaginatedStream, PaginatedStreamBuilder};
use crate::client::ClientInner;
use crate::models::{ListId, Manga, MangaId, MangaList, UserId};
use crate::{Error, Result};

/// Manga requested per round trip when resolving list members.
const MEMBER_PAGE_SIZE: i32 = 100;

/// Service for MangaDex list operations.
pub struct ListsService {
    inner: Arc<ClientInner>,
}

impl ListsService {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// Fetch a single list.
    pub async fn get(&self, id: &ListId) -> Result<MangaList> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            data: MangaList,
        }

        let envelope: Envelope = self
            .inner
            .get(&format!("/list/{id}"))
            .await
            .map_err(|err| match err {
                Error::NotFound(_) => Error::NotFound(format!("list {id} cannot be found")),
                other => other,
            })?;
        Ok(envelope.data)
    }

    /// Stream the manga belonging to a list.
    ///
    /// Membership comes from the list record itself and is resolved once,
    /// before iteration starts; pages are then fetched by ID batch. Manga
    /// present in the list but missing from the API's response ("ghosts")
    /// are logged and skipped. Adult-rated manga are dropped unless
    /// `include_unsafe` is set.
    pub fn manga(&self, list: &MangaList, include_unsafe: bool) -> PaginatedStream<Manga> {
        let inner = self.inner.clone();
        let list_name = list.name().to_string();
        let pending_ids = Arc::new(Mutex::new(VecDeque::from(list.manga_ids())));

        let stream = PaginatedStream::new(MEMBER_PAGE_SIZE, move |_offset, limit| {
            let inner = inner.clone();
            let list_name = list_name.clone();
            let pending_ids = pending_ids.clone();

            Box::pin(async move {
                let batch: Vec<MangaId> = {
                    let mut pending = pending_ids
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    let take = (limit as usize).min(pending.len());
                    pending.drain(..take).collect()
                };
                if batch.is_empty() {
                    return Ok(Vec::new());
                }

                let mut params: Vec<(String, String)> = batch
                    .iter()
                    .map(|id| ("ids[]".to_string(), id.to_string()))
                    .collect();
                params.push(("limit".to_string(), batch.len().to_string()));
                params.extend(
                    MANGA_INCLUDES
                        .iter()
                        .map(|inc| ("includes[]".to_string(), inc.to_string())),
                );
                // Rating decisions are made by the stream filter, not the
                // query, so ghost detection sees every member.
                params.extend(
                    ALL_RATINGS
                        .iter()
                        .map(|r| ("contentRating[]".to_string(), r.to_string())),
                );

                let envelope: ListEnvelope<Manga> =
                    inner.get_with_query("/manga", &params).await?;

                for id in &batch {
                    if !envelope.data.iter().any(|manga| manga.id == *id) {
                        warn!(list = %list_name, manga_id = %id, "ghost manga in list");
                    }
                }

                Ok(envelope.data)
            })
        });

        stream.with_filter(move |manga: &Manga| include_unsafe || !manga.is_adult())
    }

    /// Stream the public lists of another user.
    pub fn user_lists(&self, user_id: &UserId) -> PaginatedStream<MangaList> {
        PaginatedStreamBuilder::<MangaList>::new(
            self.inner.clone(),
            format!("/user/{user_id}/list"),
        )
        .build()
    }
}
