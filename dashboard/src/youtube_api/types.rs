//! Types shared by the YouTube API list endpoints.

use crate::error::ApiError;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

/// One page of a list response: its items, plus the token for the page after it.
pub(crate) type Page<T> = (VecDeque<T>, Option<String>);

type PageFuture<'a, F, T> = Pin<Box<dyn Future<Output = (F, Result<Page<T>, ApiError>)> + Send + 'a>>;

enum Fetch<'a, F, T> {
    InFlight(PageFuture<'a, F, T>),
    Exhausted,
}

/// Yields the items of a paginated list endpoint one at a time, requesting the next page only
/// once the current one has been drained.
///
/// The first error ends the stream.
pub struct PagedStream<'a, T, F> {
    buffered: VecDeque<T>,
    fetch: Fetch<'a, F, T>,
}

impl<'a, T, F, Fut> PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, ApiError>> + Send + 'a,
    T: Send + 'a,
{
    /// `fetch_page` is called with `None` for the first page and with the previous page's
    /// `nextPageToken` after that.
    pub fn new(fetch_page: F) -> Self {
        Self {
            buffered: VecDeque::new(),
            fetch: Fetch::InFlight(Self::request(fetch_page, None)),
        }
    }

    fn request(fetch_page: F, page_token: Option<String>) -> PageFuture<'a, F, T> {
        Box::pin(async move {
            let pending = fetch_page(page_token);
            (fetch_page, pending.await)
        })
    }
}

impl<T: Unpin, F> Unpin for PagedStream<'_, T, F> {}

impl<'a, T, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, ApiError>> + Send + 'a,
    T: Send + Unpin + 'a,
{
    type Item = Result<T, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            let Fetch::InFlight(pending) = &mut self.fetch else {
                return Poll::Ready(None);
            };
            let (fetch_page, page) = match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(done) => done,
            };

            match page {
                Ok((items, next_page_token)) => {
                    self.buffered.extend(items);
                    self.fetch = match next_page_token {
                        Some(token) => Fetch::InFlight(Self::request(fetch_page, Some(token))),
                        None => Fetch::Exhausted,
                    };
                }
                Err(e) => {
                    self.fetch = Fetch::Exhausted;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, serde::Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults")]
    pub total_results: Option<u32>,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: Option<u32>,
}
