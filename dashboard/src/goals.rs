//! Progress towards creator goals and the YouTube Partner Program thresholds.

use crate::config::Goal;
use crate::error::ApiError;
use crate::metrics::{ChannelMetrics, DateWindow, metric_names};
use crate::youtube_api::AnalyticsClient;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// Subscribers needed to apply for the YouTube Partner Program.
pub const MONETIZATION_SUBSCRIBERS: f64 = 1_000.0;
/// Public watch hours over the trailing year needed to apply for the YouTube Partner Program.
pub const MONETIZATION_WATCH_HOURS: f64 = 4_000.0;
/// Length of the trailing window the watch-hours threshold is measured over.
pub const MONETIZATION_WINDOW_DAYS: u32 = 365;
/// Public Shorts views over the trailing quarter that qualify instead of watch hours.
pub const MONETIZATION_VIEWS: f64 = 10_000_000.0;
/// Length of the trailing window the views threshold is measured over.
pub const MONETIZATION_VIEWS_WINDOW_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalMetric {
    Subscribers,
    Views,
    WatchHours,
    Videos,
}

impl GoalMetric {
    pub fn label(self) -> &'static str {
        match self {
            GoalMetric::Subscribers => "subscribers",
            GoalMetric::Views => "views",
            GoalMetric::WatchHours => "watch hours",
            GoalMetric::Videos => "videos",
        }
    }

    /// The channel's current value for this metric.
    pub fn current(self, metrics: &ChannelMetrics) -> f64 {
        match self {
            GoalMetric::Subscribers => metrics.snapshot.subscribers as f64,
            GoalMetric::Views => metrics.snapshot.total_views as f64,
            GoalMetric::WatchHours => metrics.total_watch_hours,
            GoalMetric::Videos => metrics.snapshot.total_videos as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub metric: GoalMetric,
    pub current: f64,
    pub target: f64,
    /// In `[0, 1]`.
    pub ratio: f64,
}

impl GoalProgress {
    pub fn new(metric: GoalMetric, current: f64, target: f64) -> Self {
        Self {
            metric,
            current,
            target,
            ratio: progress_ratio(current, target),
        }
    }

    pub fn achieved(&self) -> bool {
        self.ratio >= 1.0
    }
}

/// `min(current / target, 1)`, never negative. A target of zero or less is already met.
pub fn progress_ratio(current: f64, target: f64) -> f64 {
    if target <= 0.0 || target.is_nan() {
        return 1.0;
    }
    let ratio = current / target;
    if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) }
}

/// Progress towards each configured goal, in configuration order.
pub fn goal_progress(metrics: &ChannelMetrics, goals: &[Goal]) -> Vec<GoalProgress> {
    goals
        .iter()
        .map(|goal| GoalProgress::new(goal.metric, goal.metric.current(metrics), goal.target))
        .collect()
}

/// Where the channel stands against the Partner Program thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonetizationProgress {
    pub subscribers: GoalProgress,
    pub watch_hours: GoalProgress,
    pub views: GoalProgress,
}

impl MonetizationProgress {
    /// `trailing_year_minutes` is the watch time over the last [`MONETIZATION_WINDOW_DAYS`]
    /// days and `trailing_quarter_views` the views over the last
    /// [`MONETIZATION_VIEWS_WINDOW_DAYS`] days, not lifetime totals.
    pub fn new(subscribers: u64, trailing_year_minutes: f64, trailing_quarter_views: f64) -> Self {
        Self {
            subscribers: GoalProgress::new(
                GoalMetric::Subscribers,
                subscribers as f64,
                MONETIZATION_SUBSCRIBERS,
            ),
            watch_hours: GoalProgress::new(
                GoalMetric::WatchHours,
                (trailing_year_minutes / 60.0).max(0.0),
                MONETIZATION_WATCH_HOURS,
            ),
            views: GoalProgress::new(
                GoalMetric::Views,
                trailing_quarter_views.max(0.0),
                MONETIZATION_VIEWS,
            ),
        }
    }

    /// Enough subscribers, plus either the watch-hours or the views threshold.
    pub fn eligible(&self) -> bool {
        self.subscribers.achieved() && (self.watch_hours.achieved() || self.views.achieved())
    }
}

/// Fetches the trailing-year watch time and trailing-quarter views ending `today` and
/// measures them, together with `subscribers`, against the Partner Program thresholds.
pub async fn fetch_monetization(
    analytics: &AnalyticsClient,
    token: &str,
    subscribers: u64,
    today: Date,
) -> Result<MonetizationProgress, ApiError> {
    let minutes = analytics
        .fetch_total(
            token,
            metric_names::ESTIMATED_MINUTES_WATCHED,
            DateWindow::last_days(MONETIZATION_WINDOW_DAYS, today),
        )
        .await?;
    let views = analytics
        .fetch_total(
            token,
            metric_names::VIEWS,
            DateWindow::last_days(MONETIZATION_VIEWS_WINDOW_DAYS, today),
        )
        .await?;
    Ok(MonetizationProgress::new(subscribers, minutes, views))
}
