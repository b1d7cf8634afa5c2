//! Channel-level view state and the pure functions that derive it from API results.
//!
//! Nothing in here performs I/O or keeps state between calls: [`MetricsAggregator::aggregate`]
//! can be re-run from the same inputs at any time and yields the same [`ChannelMetrics`]
//! (modulo the timestamp it is handed).

use crate::youtube_api::analytics::LIFETIME_START;
use jiff::civil::Date;
use jiff::{Span, Timestamp};
use serde::Serialize;

/// Names of the Analytics API metrics this crate asks for.
pub mod metric_names {
    pub const VIEWS: &str = "views";
    pub const ESTIMATED_MINUTES_WATCHED: &str = "estimatedMinutesWatched";
    pub const SUBSCRIBERS_GAINED: &str = "subscribersGained";
    pub const SUBSCRIBERS_LOST: &str = "subscribersLost";
    pub const AVERAGE_VIEW_DURATION: &str = "averageViewDuration";
    pub const AVERAGE_VIEW_PERCENTAGE: &str = "averageViewPercentage";

    /// What the growth window report requests, per day.
    pub const GROWTH: &[&str] = &[
        VIEWS,
        ESTIMATED_MINUTES_WATCHED,
        SUBSCRIBERS_GAINED,
        SUBSCRIBERS_LOST,
    ];

    /// What the per-video report requests.
    pub const VIDEO_REPORT: &[&str] = &[
        VIEWS,
        ESTIMATED_MINUTES_WATCHED,
        AVERAGE_VIEW_DURATION,
        AVERAGE_VIEW_PERCENTAGE,
    ];
}

/// A point-in-time read of the channel's counters, from one `channels.list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub title: String,
    pub thumbnail_url: String,
    pub banner_url: Option<String>,
    pub subscribers: u64,
    pub total_views: u64,
    pub total_videos: u64,
}

/// One row of an Analytics report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSample {
    /// The `day` dimension, absent for reports that are not broken down by day.
    pub date: Option<Date>,
    /// Any other dimensions (e.g. `video`), in column order.
    pub dimensions: Vec<(String, String)>,
    /// Metric values, in column order.
    pub metrics: Vec<(String, f64)>,
}

impl AnalyticsSample {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, v)| v)
    }

    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn sum_metric(samples: &[AnalyticsSample], name: &str) -> f64 {
    samples
        .iter()
        .filter_map(|s| s.metric(name))
        .fold(0.0, |total, v| total + v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    /// The direction of a window total. Zero and NaN are neutral.
    pub fn of(total: f64) -> Self {
        if total > 0.0 {
            Trend::Up
        } else if total < 0.0 {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }
}

/// Change of one counter over the growth window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthMetric {
    pub absolute_delta: i64,
    /// `delta / baseline * 100`, or 0 when the baseline is 0.
    pub percentage: f64,
    pub trend: Trend,
    /// Set when the delta is a guess rather than something YouTube reported.
    pub estimated: bool,
}

impl GrowthMetric {
    /// Growth of `delta` against `baseline`. Only the sign of `delta` decides the trend, so a
    /// total that rounds to zero can still trend up or down.
    pub fn measured(delta: f64, baseline: f64) -> Self {
        Self {
            absolute_delta: delta.round() as i64,
            percentage: percentage_of(delta, baseline),
            trend: Trend::of(delta),
            estimated: false,
        }
    }

    fn estimated(delta: i64, baseline: f64) -> Self {
        Self {
            estimated: true,
            ..Self::measured(delta as f64, baseline)
        }
    }
}

fn percentage_of(delta: f64, baseline: f64) -> f64 {
    if baseline == 0.0 || !baseline.is_finite() || !delta.is_finite() {
        0.0
    } else {
        delta / baseline * 100.0
    }
}

/// An inclusive range of calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: Date,
    pub end: Date,
}

impl DateWindow {
    /// The `days` days ending with (and including) `today`.
    pub fn last_days(days: u32, today: Date) -> Self {
        let back = i64::from(days.max(1)) - 1;
        let start = Span::new()
            .try_days(back)
            .and_then(|span| today.checked_sub(span))
            .unwrap_or(Date::MIN);
        Self { start, end: today }
    }

    /// From the first day YouTube has analytics for up to `today`.
    pub fn lifetime(today: Date) -> Self {
        Self {
            start: LIFETIME_START,
            end: today,
        }
    }

    /// Number of days covered, counting both ends.
    pub fn len_days(&self) -> i64 {
        let span = self.end.since(self.start).map(|s| i64::from(s.get_days()));
        span.unwrap_or(0).max(0) + 1
    }
}

/// The daily rows of a growth report together with the window they cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub window: DateWindow,
    pub samples: Vec<AnalyticsSample>,
}

/// Growth over the window, per counter. `None` means not (yet) known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Growth {
    pub subscribers: Option<GrowthMetric>,
    pub views: Option<GrowthMetric>,
    pub watch_hours: Option<GrowthMetric>,
    pub videos: Option<GrowthMetric>,
}

/// Everything the dashboard shows about the channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMetrics {
    #[serde(flatten)]
    pub snapshot: ChannelSnapshot,
    pub total_watch_hours: f64,
    /// False until the lifetime watch-time report has been folded in. Until then
    /// `total_watch_hours` is 0 and should read as "pending".
    pub watch_time_known: bool,
    pub growth: Growth,
    /// The window `growth` covers, if it has been computed.
    pub window: Option<DateWindow>,
    pub last_updated: Timestamp,
}

/// Combines the channel snapshot with analytics reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregator {
    /// Attach a guessed video-count growth based on window length. YouTube reports no such
    /// metric, so this is off unless asked for.
    pub estimate_video_growth: bool,
}

impl MetricsAggregator {
    pub fn new(estimate_video_growth: bool) -> Self {
        Self {
            estimate_video_growth,
        }
    }

    /// Builds the view state from whatever has arrived so far.
    ///
    /// Missing lifetime minutes leave watch hours at 0. A missing window report leaves every
    /// growth metric `None`; an empty one yields zero growth with a neutral trend.
    pub fn aggregate(
        &self,
        snapshot: &ChannelSnapshot,
        lifetime_minutes: Option<f64>,
        window: Option<&WindowReport>,
        last_updated: Timestamp,
    ) -> ChannelMetrics {
        let total_watch_hours = lifetime_minutes.map_or(0.0, |m| (m / 60.0).max(0.0));

        let growth = window.map_or_else(Growth::default, |report| {
            let samples = &report.samples;
            let net_subscribers = sum_metric(samples, metric_names::SUBSCRIBERS_GAINED)
                - sum_metric(samples, metric_names::SUBSCRIBERS_LOST);
            let views = sum_metric(samples, metric_names::VIEWS);
            let watch_hours = sum_metric(samples, metric_names::ESTIMATED_MINUTES_WATCHED) / 60.0;

            Growth {
                subscribers: Some(GrowthMetric::measured(
                    net_subscribers,
                    snapshot.subscribers as f64,
                )),
                views: Some(GrowthMetric::measured(views, snapshot.total_views as f64)),
                watch_hours: Some(GrowthMetric::measured(watch_hours, total_watch_hours)),
                videos: self.estimate_video_growth.then(|| {
                    GrowthMetric::estimated(
                        estimated_uploads(report.window.len_days()),
                        snapshot.total_videos as f64,
                    )
                }),
            }
        });

        ChannelMetrics {
            snapshot: snapshot.clone(),
            total_watch_hours,
            watch_time_known: lifetime_minutes.is_some(),
            growth,
            window: window.map(|r| r.window),
            last_updated,
        }
    }
}

/// A rough number of uploads for a window of the given length, for channels that post about
/// weekly. Not derived from any data.
fn estimated_uploads(window_days: i64) -> i64 {
    match window_days {
        ..=7 => 1,
        8..=30 => 4,
        _ => 12,
    }
}
