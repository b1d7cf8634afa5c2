//! Per-video health scoring.
//!
//! A video gets exactly one [`HealthIssue`], the first rule below that it trips, and a score
//! that starts at 100 and loses that issue's penalty:
//!
//! | rule                                   | issue       | penalty |
//! |----------------------------------------|-------------|---------|
//! | thumbnail CTR below 5%                 | `thumbnail` | 30      |
//! | average view duration below 20 seconds | `hook`      | 40      |
//! | retention below 35%                    | `retention` | 25      |
//! | fewer views than expected              | `discovery` | 15      |

use serde::Serialize;

const MIN_THUMBNAIL_CTR: f64 = 0.05;
const MIN_AVERAGE_VIEW_DURATION_SECS: u64 = 20;
const MIN_RETENTION: f64 = 0.35;

/// What a video is compared against, usually the average over the channel's recent uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VideoBenchmark {
    /// Also serves as the expected view count.
    pub views: u64,
    pub watch_time_minutes: u64,
    pub drop_off_seconds: u64,
    pub thumbnail_ctr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetrics {
    pub video_id: String,
    pub title: String,
    pub views: u64,
    pub watch_time_minutes: u64,
    /// The point at which the typical viewer has stopped watching.
    pub drop_off_seconds: u64,
    pub average_view_duration_secs: u64,
    /// Fraction of the video the average viewer watches, in `[0, 1]`.
    pub retention: f64,
    /// Impressions click-through rate, in `[0, 1]`. `None` when YouTube did not report it.
    pub thumbnail_ctr: Option<f64>,
    pub benchmark: VideoBenchmark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthIssue {
    Thumbnail,
    Hook,
    Retention,
    Discovery,
    None,
}

impl HealthIssue {
    fn penalty(self) -> u8 {
        match self {
            HealthIssue::Thumbnail => 30,
            HealthIssue::Hook => 40,
            HealthIssue::Retention => 25,
            HealthIssue::Discovery => 15,
            HealthIssue::None => 0,
        }
    }

    /// Short headline for a coaching card.
    pub fn title(self) -> &'static str {
        match self {
            HealthIssue::Thumbnail => "Fix your thumbnail & title",
            HealthIssue::Hook => "Fix your first 10 seconds",
            HealthIssue::Retention => "Improve mid-video retention",
            HealthIssue::Discovery => "Improve discovery & SEO",
            HealthIssue::None => "This video is healthy",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            HealthIssue::Thumbnail => "Your video isn't getting clicked enough to unlock reach.",
            HealthIssue::Hook => "Viewers are leaving before YouTube trusts the video.",
            HealthIssue::Retention => "Viewers lose interest before the payoff.",
            HealthIssue::Discovery => "The video performs well, but isn't being surfaced.",
            HealthIssue::None => "No immediate action needed.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthAssessment {
    pub primary_issue: HealthIssue,
    /// In `[0, 100]`.
    pub score: u8,
}

/// Scores a video. Total: any input produces an assessment, and the same input always
/// produces the same one.
pub fn score(video: &VideoMetrics) -> HealthAssessment {
    let primary_issue = primary_issue(video);
    HealthAssessment {
        primary_issue,
        score: 100u8.saturating_sub(primary_issue.penalty()),
    }
}

fn primary_issue(video: &VideoMetrics) -> HealthIssue {
    // NaN never compares less-than, so unknown ratios fall through to the next rule
    if video.thumbnail_ctr.is_some_and(|ctr| ctr < MIN_THUMBNAIL_CTR) {
        HealthIssue::Thumbnail
    } else if video.average_view_duration_secs < MIN_AVERAGE_VIEW_DURATION_SECS {
        HealthIssue::Hook
    } else if video.retention < MIN_RETENTION {
        HealthIssue::Retention
    } else if video.views < video.benchmark.views {
        HealthIssue::Discovery
    } else {
        HealthIssue::None
    }
}

/// A metric [`below_benchmark`] compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparedMetric {
    Views,
    WatchTime,
    DropOff,
    ThumbnailCtr,
}

impl ComparedMetric {
    pub fn label(self) -> &'static str {
        match self {
            ComparedMetric::Views => "Views",
            ComparedMetric::WatchTime => "Watch Time",
            ComparedMetric::DropOff => "Drop-off",
            ComparedMetric::ThumbnailCtr => "Thumbnail CTR",
        }
    }
}

/// Every metric on which the video falls short of its benchmark, in a fixed order.
///
/// Thumbnail CTR is only compared when both sides know it.
pub fn below_benchmark(video: &VideoMetrics) -> Vec<ComparedMetric> {
    let benchmark = &video.benchmark;
    let mut short = Vec::new();
    if video.views < benchmark.views {
        short.push(ComparedMetric::Views);
    }
    if video.watch_time_minutes < benchmark.watch_time_minutes {
        short.push(ComparedMetric::WatchTime);
    }
    if video.drop_off_seconds < benchmark.drop_off_seconds {
        short.push(ComparedMetric::DropOff);
    }
    if let (Some(ctr), Some(expected)) = (video.thumbnail_ctr, benchmark.thumbnail_ctr)
        && ctr < expected
    {
        short.push(ComparedMetric::ThumbnailCtr);
    }
    short
}
