//! YouTube PlaylistItems API types, used to enumerate a channel's uploads.

use crate::error::ApiError;
use crate::youtube_api::client::ApiClient;
use crate::youtube_api::types::{Page, PageInfo, PagedStream};
use jiff::Timestamp;
use serde::Deserialize;
use std::collections::VecDeque;
use tokio_stream::Stream;
use tracing::instrument;

/// Response structure for the `playlistItems.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
#[derive(Debug, Deserialize)]
pub struct PlaylistItemListResponse {
    #[serde(default)]
    pub items: VecDeque<PlaylistItem>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#resource>
#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    pub snippet: Option<PlaylistItemSnippet>,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemSnippet {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemContentDetails {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
    /// Absent for videos that are private or deleted.
    #[serde(rename = "videoPublishedAt")]
    pub video_published_at: Option<Timestamp>,
}

/// The identifying details of one uploaded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub published_at: Option<Timestamp>,
}

impl PlaylistItem {
    /// `None` for items missing the video ID or title, which YouTube sends for removed videos.
    fn into_summary(self) -> Option<VideoSummary> {
        let title = self.snippet?.title?;
        let details = self.content_details?;
        Some(VideoSummary {
            video_id: details.video_id?,
            title,
            published_at: details.video_published_at,
        })
    }
}

/// Reads the contents of playlists.
#[derive(Debug, Clone)]
pub struct PlaylistClient {
    api: ApiClient,
}

impl PlaylistClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Returns a paginated stream of the videos in a playlist, in playlist order.
    ///
    /// For a channel's uploads playlist that order is newest first. Pages are only requested as
    /// the stream is consumed, so `.take(n)` costs at most `ceil(n / 50)` calls.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    pub fn list_videos(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> impl Stream<Item = Result<VideoSummary, ApiError>> + Send + 'static {
        let api = self.api.clone();
        let token = token.to_string();
        let playlist_id = playlist_id.to_string();
        PagedStream::new(move |page_token: Option<String>| {
            let api = api.clone();
            let token = token.clone();
            let playlist_id = playlist_id.clone();
            async move { list_page(&api, &token, &playlist_id, page_token).await }
        })
    }
}

#[instrument(skip(api, token))]
async fn list_page(
    api: &ApiClient,
    token: &str,
    playlist_id: &str,
    page_token: Option<String>,
) -> Result<Page<VideoSummary>, ApiError> {
    let url = api.endpoints().data("playlistItems");
    let mut query_params = vec![
        ("part", "snippet,contentDetails"),
        ("maxResults", "50"),
        ("playlistId", playlist_id),
    ];
    if let Some(page_token) = page_token.as_deref() {
        query_params.push(("pageToken", page_token));
    }

    let response: PlaylistItemListResponse = api.get_json(token, &url, &query_params).await?;
    let returned_items = response.items.len();
    let videos: VecDeque<VideoSummary> = response
        .items
        .into_iter()
        .filter_map(PlaylistItem::into_summary)
        .collect();
    tracing::debug!(
        returned_items,
        usable = videos.len(),
        has_next_page = response.next_page_token.is_some(),
        "fetched playlist page"
    );
    Ok((videos, response.next_page_token))
}
