//! Health checks for the channel's most recent uploads.

use crate::error::{ApiError, Recovery};
use crate::health::{self, ComparedMetric, HealthAssessment, VideoBenchmark, VideoMetrics};
use crate::metrics::{AnalyticsSample, DateWindow, metric_names};
use crate::youtube_api::playlists::VideoSummary;
use crate::youtube_api::{AnalyticsClient, ApiClient, ChannelStatsClient, PlaylistClient};
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing::instrument;

/// One reviewed video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoachedVideo {
    pub metrics: VideoMetrics,
    pub assessment: HealthAssessment,
    pub below_benchmark: Vec<ComparedMetric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoachReport {
    /// Most viewed first.
    pub videos: Vec<CoachedVideo>,
}

impl CoachReport {
    /// The video featured on the coach card.
    pub fn featured(&self) -> Option<&CoachedVideo> {
        self.videos.first()
    }
}

/// Reviews recent uploads against the channel's own average.
#[derive(Debug, Clone)]
pub struct Coach {
    channels: ChannelStatsClient,
    playlists: PlaylistClient,
    analytics: AnalyticsClient,
    max_videos: usize,
}

impl Coach {
    pub fn new(api: ApiClient, max_videos: usize) -> Self {
        Self {
            channels: ChannelStatsClient::new(api.clone()),
            playlists: PlaylistClient::new(api.clone()),
            analytics: AnalyticsClient::new(api),
            max_videos,
        }
    }

    /// Fetches the `max_videos` newest uploads and their analytics over `window`, then scores
    /// each one against the average of the set.
    ///
    /// A video whose report fails for reasons other than authorization is reviewed as if it
    /// had no data yet.
    #[instrument(skip(self, token))]
    pub async fn review(&self, token: &str, window: DateWindow) -> Result<CoachReport, ApiError> {
        let playlist_id = self.channels.uploads_playlist_id(token).await?;
        let uploads: Vec<VideoSummary> = self
            .playlists
            .list_videos(token, &playlist_id)
            .take(self.max_videos)
            .collect::<Result<_, _>>()
            .await?;
        tracing::debug!(uploads = uploads.len(), "reviewing recent uploads");

        let mut videos = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let report = match self
                .analytics
                .fetch_video_report(token, &upload.video_id, window.start, window.end)
                .await
            {
                Ok(report) => report,
                Err(e) if matches!(e.recovery(), Recovery::SignIn | Recovery::GrantConsent) => {
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        video_id = %upload.video_id,
                        error = %e,
                        "failed to fetch video analytics"
                    );
                    None
                }
            };
            videos.push(video_metrics(upload, report.as_ref()));
        }

        Ok(build_report(videos))
    }
}

fn count(value: Option<f64>) -> u64 {
    // `as` saturates, and sends NaN to 0
    value.unwrap_or(0.0).round().max(0.0) as u64
}

/// Raw metrics for one video. The benchmark is filled in later by [`build_report`].
fn video_metrics(upload: VideoSummary, report: Option<&AnalyticsSample>) -> VideoMetrics {
    let metric = |name| report.and_then(|r| r.metric(name));
    let average_view_duration_secs = count(metric(metric_names::AVERAGE_VIEW_DURATION));
    let retention = metric(metric_names::AVERAGE_VIEW_PERCENTAGE)
        .map_or(0.0, |pct| (pct / 100.0).clamp(0.0, 1.0));

    VideoMetrics {
        video_id: upload.video_id,
        title: upload.title,
        views: count(metric(metric_names::VIEWS)),
        watch_time_minutes: count(metric(metric_names::ESTIMATED_MINUTES_WATCHED)),
        // the typical viewer leaves once the average view duration is up
        drop_off_seconds: average_view_duration_secs,
        average_view_duration_secs,
        retention,
        // not exposed by the Analytics API
        thumbnail_ctr: None,
        benchmark: VideoBenchmark::default(),
    }
}

/// The average over `videos`, or all zeros if there are none.
pub fn average_benchmark(videos: &[VideoMetrics]) -> VideoBenchmark {
    if videos.is_empty() {
        return VideoBenchmark::default();
    }
    let n = videos.len() as u64;
    let ctrs: Vec<f64> = videos.iter().filter_map(|v| v.thumbnail_ctr).collect();
    VideoBenchmark {
        views: videos.iter().map(|v| v.views).sum::<u64>() / n,
        watch_time_minutes: videos.iter().map(|v| v.watch_time_minutes).sum::<u64>() / n,
        drop_off_seconds: videos.iter().map(|v| v.drop_off_seconds).sum::<u64>() / n,
        thumbnail_ctr: (!ctrs.is_empty())
            .then(|| ctrs.iter().fold(0.0, |total, ctr| total + ctr) / ctrs.len() as f64),
    }
}

/// Benchmarks every video against the set, scores it, and sorts by views descending.
pub fn build_report(mut videos: Vec<VideoMetrics>) -> CoachReport {
    let benchmark = average_benchmark(&videos);
    for video in &mut videos {
        video.benchmark = benchmark;
    }
    videos.sort_by(|a, b| b.views.cmp(&a.views));

    CoachReport {
        videos: videos
            .into_iter()
            .map(|metrics| CoachedVideo {
                assessment: health::score(&metrics),
                below_benchmark: health::below_benchmark(&metrics),
                metrics,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthIssue;
    use crate::test_support::{MockServer, Reply};
    use jiff::civil::date;
    use pretty_assertions::assert_eq;

    const UPLOADS: &str = r#"{"items": [{"id": "UC1", "contentDetails": {"relatedPlaylists": {"uploads": "UU1"}}}]}"#;

    fn playlist() -> String {
        let item = |id: &str, title: &str| {
            format!(
                r#"{{"snippet": {{"title": "{title}"}}, "contentDetails": {{"videoId": "{id}"}}}}"#
            )
        };
        format!(
            r#"{{"items": [{}, {}, {}]}}"#,
            item("new", "Newest"),
            item("mid", "Middle"),
            item("old", "Oldest")
        )
    }

    fn video_report(id: &str, views: u64, minutes: u64, duration: u64, pct: f64) -> String {
        format!(
            r#"{{
              "columnHeaders": [
                {{"name": "video", "columnType": "DIMENSION"}},
                {{"name": "views", "columnType": "METRIC"}},
                {{"name": "estimatedMinutesWatched", "columnType": "METRIC"}},
                {{"name": "averageViewDuration", "columnType": "METRIC"}},
                {{"name": "averageViewPercentage", "columnType": "METRIC"}}
              ],
              "rows": [["{id}", {views}, {minutes}, {duration}, {pct}]]
            }}"#
        )
    }

    fn window() -> DateWindow {
        DateWindow::lifetime(date(2025, 6, 30))
    }

    #[tokio::test]
    async fn reviews_uploads() {
        let playlist = playlist();
        let server = MockServer::start(move |path, query| {
            let param = |k: &str| {
                query
                    .iter()
                    .find(|(key, _)| key == k)
                    .map(|(_, v)| v.as_str())
            };
            match path {
                "/youtube/v3/channels" => Reply::json(200, UPLOADS),
                "/youtube/v3/playlistItems" => Reply::json(200, playlist.clone()),
                "/v2/reports" => match param("filters") {
                    Some("video==new") => Reply::json(200, video_report("new", 300, 600, 12, 20.0)),
                    Some("video==mid") => Reply::json(200, video_report("mid", 1_500, 3_000, 95, 55.0)),
                    _ => Reply::json(200, r#"{"columnHeaders": []}"#),
                },
                _ => Reply::json(404, "{}"),
            }
        })
        .await;

        let coach = Coach::new(server.client(), 10);
        let report = coach.review("tok", window()).await.unwrap();

        let ids: Vec<&str> = report
            .videos
            .iter()
            .map(|v| v.metrics.video_id.as_str())
            .collect();
        assert_eq!(ids, vec!["mid", "new", "old"]);
        assert_eq!(report.featured().unwrap().metrics.title, "Middle");

        let benchmark = VideoBenchmark {
            views: 600,
            watch_time_minutes: 1_200,
            drop_off_seconds: 35,
            thumbnail_ctr: None,
        };
        for video in &report.videos {
            assert_eq!(video.metrics.benchmark, benchmark);
        }

        let mid = &report.videos[0];
        assert_eq!(mid.metrics.views, 1_500);
        assert!((mid.metrics.retention - 0.55).abs() < 1e-9);
        assert_eq!(mid.assessment.primary_issue, HealthIssue::None);
        assert_eq!(mid.below_benchmark, Vec::new());

        let new = &report.videos[1];
        assert_eq!(new.assessment.primary_issue, HealthIssue::Hook);
        assert_eq!(new.assessment.score, 60);
        assert_eq!(
            new.below_benchmark,
            vec![
                ComparedMetric::Views,
                ComparedMetric::WatchTime,
                ComparedMetric::DropOff
            ]
        );

        // no analytics yet
        let old = &report.videos[2];
        assert_eq!(old.metrics.views, 0);
        assert_eq!(old.assessment.primary_issue, HealthIssue::Hook);

        let requests = server.requests();
        assert_eq!(requests[0].param("part"), Some("contentDetails"));
        assert_eq!(requests[1].param("playlistId"), Some("UU1"));
        assert_eq!(requests[2].param("startDate"), Some("2005-01-01"));
        assert_eq!(requests[2].param("endDate"), Some("2025-06-30"));
    }

    #[tokio::test]
    async fn only_reviews_newest() {
        let playlist = playlist();
        let server = MockServer::start(move |path, _| match path {
            "/youtube/v3/channels" => Reply::json(200, UPLOADS),
            "/youtube/v3/playlistItems" => Reply::json(200, playlist.clone()),
            _ => Reply::json(200, r#"{"columnHeaders": []}"#),
        })
        .await;

        let report = Coach::new(server.client(), 2)
            .review("tok", window())
            .await
            .unwrap();
        assert_eq!(report.videos.len(), 2);
        let reports = server
            .requests()
            .into_iter()
            .filter(|r| r.path == "/v2/reports")
            .count();
        assert_eq!(reports, 2);
    }

    #[tokio::test]
    async fn missing_scope_aborts_review() {
        let playlist = playlist();
        let server = MockServer::start(move |path, _| match path {
            "/youtube/v3/channels" => Reply::json(200, UPLOADS),
            "/youtube/v3/playlistItems" => Reply::json(200, playlist.clone()),
            _ => Reply::json(
                403,
                r#"{"error": {"code": 403, "message": "Request had insufficient authentication scopes.",
                    "errors": [{"reason": "insufficientPermissions"}]}}"#,
            ),
        })
        .await;

        let err = Coach::new(server.client(), 10)
            .review("tok", window())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Scope(_)));
    }

    #[tokio::test]
    async fn failed_report_counts_as_no_data() {
        let playlist = playlist();
        let server = MockServer::start(move |path, query| {
            let video = query
                .iter()
                .find(|(k, _)| k == "filters")
                .map(|(_, v)| v.clone());
            match (path, video.as_deref()) {
                ("/youtube/v3/channels", _) => Reply::json(200, UPLOADS),
                ("/youtube/v3/playlistItems", _) => Reply::json(200, playlist.clone()),
                (_, Some("video==mid")) => Reply::json(500, "backend error"),
                (_, Some(filter)) => {
                    let id = filter.trim_start_matches("video==");
                    Reply::json(200, video_report(id, 10, 10, 40, 60.0))
                }
                _ => Reply::json(404, "{}"),
            }
        })
        .await;

        let report = Coach::new(server.client(), 10)
            .review("tok", window())
            .await
            .unwrap();
        assert_eq!(report.videos.len(), 3);
        let mid = report
            .videos
            .iter()
            .find(|v| v.metrics.video_id == "mid")
            .unwrap();
        assert_eq!(mid.metrics.views, 0);
    }

    #[test]
    fn empty_channel() {
        assert_eq!(build_report(Vec::new()), CoachReport::default());
        assert_eq!(average_benchmark(&[]), VideoBenchmark::default());
    }

    #[test]
    fn ctr_benchmark_averages_known_values() {
        let upload = |id: &str| VideoSummary {
            video_id: id.to_string(),
            title: id.to_string(),
            published_at: None,
        };
        let mut a = video_metrics(upload("a"), None);
        a.thumbnail_ctr = Some(0.04);
        let mut b = video_metrics(upload("b"), None);
        b.thumbnail_ctr = Some(0.08);
        let c = video_metrics(upload("c"), None);

        let benchmark = average_benchmark(&[a, b, c]);
        assert!((benchmark.thumbnail_ctr.unwrap() - 0.06).abs() < 1e-9);
    }
}
