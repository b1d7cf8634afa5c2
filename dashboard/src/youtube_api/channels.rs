//! YouTube Channels API types and the channel statistics client.

use crate::error::ApiError;
use crate::metrics::ChannelSnapshot;
use crate::youtube_api::client::ApiClient;
use crate::youtube_api::types::PageInfo;
use serde::Deserialize;
use tracing::instrument;

/// Response structure for the `channels.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels/list>
#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    /// The channels that match the request. Absent (rather than empty) when the account has no
    /// channel.
    #[serde(default)]
    pub items: Vec<Channel>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
}

/// A `channel` resource, restricted to the parts this crate requests.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels#resource>
#[derive(Debug, Deserialize)]
pub struct Channel {
    pub id: String,
    pub snippet: Option<ChannelSnippet>,
    pub statistics: Option<ChannelStatistics>,
    #[serde(rename = "brandingSettings")]
    pub branding_settings: Option<BrandingSettings>,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelSnippet {
    pub title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

/// Thumbnail images in the sizes YouTube provides.
///
/// See: <https://developers.google.com/youtube/v3/docs/thumbnails>
#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

impl Thumbnails {
    /// The smallest available image URL, or an empty string if there is none.
    pub fn best_small_url(&self) -> &str {
        [&self.default, &self.medium, &self.high]
            .into_iter()
            .flatten()
            .map(|t| t.url.as_str())
            .next()
            .unwrap_or("")
    }
}

/// Channel counters.
///
/// YouTube returns these as decimal strings. `subscriberCount` is missing entirely when the
/// channel hides it.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels#statistics>
#[derive(Debug, Default, Deserialize)]
pub struct ChannelStatistics {
    #[serde(rename = "viewCount")]
    pub view_count: Option<String>,
    #[serde(rename = "subscriberCount")]
    pub subscriber_count: Option<String>,
    #[serde(rename = "videoCount")]
    pub video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BrandingSettings {
    pub image: Option<BrandingImage>,
}

#[derive(Debug, Deserialize)]
pub struct BrandingImage {
    #[serde(rename = "bannerExternalUrl")]
    pub banner_external_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    /// The playlist holding every public upload of the channel.
    pub uploads: Option<String>,
}

/// Parses one of YouTube's stringified counters, treating anything unparsable as zero.
pub(crate) fn lenient_count(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok()).unwrap_or(0)
}

impl Channel {
    /// Builds a [`ChannelSnapshot`] from a channel fetched with `snippet,statistics`.
    pub fn into_snapshot(self) -> Result<ChannelSnapshot, ApiError> {
        let snippet = self
            .snippet
            .ok_or_else(|| ApiError::Decode(format!("channel {} has no snippet", self.id)))?;
        let statistics = self.statistics.unwrap_or_default();
        let banner_url = self
            .branding_settings
            .and_then(|b| b.image)
            .and_then(|i| i.banner_external_url)
            .filter(|url| !url.is_empty());

        Ok(ChannelSnapshot {
            title: snippet.title,
            thumbnail_url: snippet.thumbnails.best_small_url().to_string(),
            banner_url,
            subscribers: lenient_count(statistics.subscriber_count.as_deref()),
            total_views: lenient_count(statistics.view_count.as_deref()),
            total_videos: lenient_count(statistics.video_count.as_deref()),
        })
    }
}

/// Reads the authenticated user's channel.
#[derive(Debug, Clone)]
pub struct ChannelStatsClient {
    api: ApiClient,
}

impl ChannelStatsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Fetches title, artwork, and counters of the signed-in user's channel.
    ///
    /// Uses `channels.list` with `part=snippet,statistics,brandingSettings&mine=true`. If the
    /// account owns several channels, the first one YouTube returns is used.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self, token))]
    pub async fn fetch(&self, token: &str) -> Result<ChannelSnapshot, ApiError> {
        let url = self.api.endpoints().data("channels");
        let query_params = [
            ("part", "snippet,statistics,brandingSettings"),
            ("mine", "true"),
        ];
        let response: ChannelListResponse = self.api.get_json(token, &url, &query_params).await?;
        tracing::debug!(
            returned_items = response.items.len(),
            total_results = ?response.page_info.total_results,
            "fetched channel"
        );

        let channel = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Decode("no channel found for this account".to_string()))?;
        channel.into_snapshot()
    }

    /// Looks up the ID of the playlist that holds all of the channel's uploads.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self, token), ret)]
    pub async fn uploads_playlist_id(&self, token: &str) -> Result<String, ApiError> {
        let url = self.api.endpoints().data("channels");
        let query_params = [("part", "contentDetails"), ("mine", "true")];
        let response: ChannelListResponse = self.api.get_json(token, &url, &query_params).await?;

        response
            .items
            .into_iter()
            .next()
            .and_then(|c| c.content_details)
            .and_then(|d| d.related_playlists.uploads)
            .ok_or_else(|| ApiError::Decode("uploads playlist not found".to_string()))
    }
}
