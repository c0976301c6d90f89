//! Paginated stream for lazy iteration over list endpoints.
//!
//! Every list-returning endpoint drives the same engine: a [`PaginatedStream`]
//! keeps an offset cursor and a buffered page, fetching the next page only
//! when the buffer runs dry. Streams are single-pass and forward-only; to
//! iterate again, build a new one.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::de::DeserializeOwned;

use super::ClientInner;
use crate::Result;

/// The API stops serving results past this absolute offset.
pub const MAX_RESULTS: i32 = 10_000;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: i32 = 100;

/// Envelope returned by every list endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct ListEnvelope<T> {
    /// The items in this page.
    pub data: Vec<T>,
}

/// Type alias for a boxed future used internally.
type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

type PageFetcher<T> =
    Box<dyn Fn(i32, i32) -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

type ItemFilter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// A stream that lazily fetches pages from an offset-paginated endpoint.
///
/// Yields items strictly in fetch order. Terminates when a page comes back
/// with fewer items than requested (zero included) or when the cursor
/// reaches the API's absolute result ceiling. Items rejected by the filter
/// are dropped silently; they advance the cursor but neither reach the
/// consumer nor end the stream.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
/// use mangadex_rs::{ClientConfig, MangadexClient};
///
/// # async fn example() -> mangadex_rs::Result<()> {
/// let client = MangadexClient::new(ClientConfig::default())?;
/// let mut stream = client.manga().search("one piece", false);
///
/// while let Some(result) = stream.next().await {
///     let manga = result?;
///     println!("{}", manga.title().unwrap_or("<untitled>"));
/// }
/// # Ok(())
/// # }
/// ```
impl<T> std::fmt::Debug for PaginatedStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedStream").finish_non_exhaustive()
    }
}

pub struct PaginatedStream<T> {
    /// Fetches one raw page: `(offset, limit) -> items`.
    fetch_page: PageFetcher<T>,
    /// Per-endpoint predicate; rejected items are never yielded.
    filter: Option<ItemFilter<T>>,
    /// Items of the current page not yet yielded.
    buffer: VecDeque<T>,
    /// Items per fetch.
    limit: i32,
    /// Running count of raw items fetched so far.
    offset: i32,
    /// No further fetches will be made.
    exhausted: bool,
    /// Current in-flight fetch.
    pending_fetch: Option<BoxFuture<'static, Result<Vec<T>>>>,
}

impl<T> PaginatedStream<T>
where
    T: Send + 'static,
{
    /// Create a stream over a page-fetch function.
    pub fn new<F>(limit: i32, fetch_page: F) -> Self
    where
        F: Fn(i32, i32) -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync + 'static,
    {
        Self {
            fetch_page: Box::new(fetch_page),
            filter: None,
            buffer: VecDeque::new(),
            limit,
            offset: 0,
            exhausted: false,
            pending_fetch: None,
        }
    }

    /// Drop items failing the predicate instead of yielding them.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }
}

impl<T> Stream for PaginatedStream<T>
where
    T: Unpin,
{
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            // Yield from the current page first.
            if let Some(item) = this.buffer.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            // Buffer dry: drive the in-flight fetch if there is one.
            if let Some(ref mut fut) = this.pending_fetch {
                match fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(items)) => {
                        this.pending_fetch = None;

                        let fetched = items.len() as i32;
                        this.offset += fetched;
                        if fetched < this.limit || this.offset >= MAX_RESULTS {
                            this.exhausted = true;
                        }

                        let filter = &this.filter;
                        this.buffer.extend(
                            items
                                .into_iter()
                                .filter(|item| filter.as_ref().map_or(true, |keep| keep(item))),
                        );
                        // An entirely filtered-out page is not the end of
                        // the data; loop to fetch the next one.
                        continue;
                    }
                    Poll::Ready(Err(e)) => {
                        this.pending_fetch = None;
                        this.exhausted = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            if this.exhausted {
                return Poll::Ready(None);
            }

            let fut = (this.fetch_page)(this.offset, this.limit);
            this.pending_fetch = Some(fut);
        }
    }
}

impl<T> Unpin for PaginatedStream<T> {}

/// Builder for streams over `GET <path>?limit&offset&…filters` endpoints.
pub(crate) struct PaginatedStreamBuilder<T> {
    inner: Arc<ClientInner>,
    path: String,
    limit: i32,
    query: Vec<(String, String)>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned + Unpin + Send + 'static> PaginatedStreamBuilder<T> {
    pub(crate) fn new(inner: Arc<ClientInner>, path: impl Into<String>) -> Self {
        Self {
            inner,
            path: path.into(),
            limit: DEFAULT_PAGE_SIZE,
            query: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Set the number of items per page.
    pub(crate) fn limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    /// Append an endpoint-specific query parameter.
    pub(crate) fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append one `key[]` entry per value.
    pub(crate) fn array_param<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.query.push((format!("{key}[]"), value.into()));
        }
        self
    }

    /// Build the stream.
    pub(crate) fn build(self) -> PaginatedStream<T> {
        let inner = self.inner;
        let path = self.path;
        let query = Arc::new(self.query);

        PaginatedStream::new(self.limit, move |offset, limit| {
            let inner = inner.clone();
            let path = path.clone();
            let query = query.clone();

            Box::pin(async move {
                let mut params: Vec<(String, String)> = vec![
                    ("limit".into(), limit.to_string()),
                    ("offset".into(), offset.to_string()),
                ];
                params.extend(query.iter().cloned());

                let envelope: ListEnvelope<T> =
                    inner.get_with_query(&path, &params).await?;
                Ok(envelope.data)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A stream backed by scripted pages, counting fetches.
    fn scripted_stream(
        limit: i32,
        pages: Vec<Vec<i32>>,
    ) -> (PaginatedStream<i32>, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let pages = Arc::new(Mutex::new(VecDeque::from(pages)));

        let stream = PaginatedStream::new(limit, move |_offset, _limit| {
            let pages = pages.clone();
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(pages.lock().unwrap().pop_front().unwrap_or_default())
            })
        });
        (stream, fetches)
    }

    #[tokio::test]
    async fn test_yields_all_items_in_order_and_stops() {
        let pages = vec![
            (0..100).collect::<Vec<_>>(),
            (100..200).collect::<Vec<_>>(),
            (200..237).collect::<Vec<_>>(),
        ];
        let (stream, fetches) = scripted_stream(100, pages);

        let items: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items.len(), 237);
        assert_eq!(items, (0..237).collect::<Vec<_>>());
        // The short third page ends iteration; no fourth fetch happens.
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_first_page_is_end_of_data() {
        let (stream, fetches) = scripted_stream(100, vec![vec![]]);
        let items: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
        assert!(items.is_empty());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_filter_drops_items_without_ending_stream() {
        // 10 items, 3 "adult-flagged" (negative); page size 10.
        let page: Vec<i32> = vec![1, -2, 3, 4, -5, 6, 7, -8, 9, 10];
        let (stream, _) = scripted_stream(10, vec![page.clone(), vec![]]);
        let stream = stream.with_filter(|n: &i32| *n > 0);

        let items: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items.len(), 7);

        // With the filter disabled all 10 come through.
        let (stream, _) = scripted_stream(10, vec![page, vec![]]);
        let items: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items.len(), 10);
    }

    #[tokio::test]
    async fn test_fully_filtered_page_keeps_fetching() {
        let pages = vec![vec![-1; 10], vec![1, 2, 3]];
        let (stream, fetches) = scripted_stream(10, pages);
        let stream = stream.with_filter(|n: &i32| *n > 0);

        let items: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items, vec![1, 2, 3]);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_result_ceiling_terminates_iteration() {
        // Endless full pages; the ceiling must cut iteration off.
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let stream = PaginatedStream::new(2000, move |offset, limit| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok((offset..offset + limit).collect()) })
        });

        let items: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items.len(), MAX_RESULTS as usize);
        assert_eq!(fetches.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_offsets_increase_monotonically() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let stream = PaginatedStream::new(3, move |offset, _limit| {
            record.lock().unwrap().push(offset);
            Box::pin(async move {
                if offset >= 6 {
                    Ok(vec![])
                } else {
                    Ok(vec![0, 0, 0])
                }
            })
        });

        let _: Vec<i32> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 3, 6]);
    }

    #[tokio::test]
    async fn test_error_ends_stream_after_surfacing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let stream = PaginatedStream::new(2, move |_offset, _limit| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n == 0 {
                    Ok(vec![1, 2])
                } else {
                    Err(crate::Error::Http { status: 500 })
                }
            })
        });

        let results: Vec<Result<i32>> = stream.collect().await;
        // Items yielded before the failure are preserved.
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
    }
}
