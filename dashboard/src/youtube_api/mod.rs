//! Clients for the two Google APIs the dashboard reads from.
//!
//! # Data API vs Analytics API
//!
//! The YouTube Data API v3 (`www.googleapis.com/youtube/v3`) serves public resource state:
//! the channel's title, artwork, and running counters, and the contents of its uploads
//! playlist. It needs the `youtube.readonly` scope.
//!
//! The YouTube Analytics API v2 (`youtubeanalytics.googleapis.com/v2`) serves reports: metric
//! totals over a date range, optionally broken down by day or by video. It needs the separate
//! `yt-analytics.readonly` scope, which a user may not have granted even if they granted the
//! first. That case surfaces as [`ApiError::Scope`](crate::error::ApiError::Scope).
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use youtube_creator_dashboard::config::Config;
//! use youtube_creator_dashboard::youtube_api::{ApiClient, ChannelStatsClient};
//!
//! # async fn example(token: &str) -> eyre::Result<()> {
//! let api = ApiClient::new(&Config::default())?;
//! let snapshot = ChannelStatsClient::new(api).fetch(token).await?;
//! println!("{} has {} subscribers", snapshot.title, snapshot.subscribers);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod channels;
pub mod client;
pub mod playlists;
pub mod types;

pub use analytics::AnalyticsClient;
pub use channels::ChannelStatsClient;
pub use client::{ApiClient, Endpoints};
pub use playlists::{PlaylistClient, VideoSummary};
pub use types::{PageInfo, PagedStream};
