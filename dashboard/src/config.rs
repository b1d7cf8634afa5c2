//! Dashboard configuration.
//!
//! Every field has a default, so an absent or partial config file is fine.

use crate::goals::GoalMetric;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable the CLI reads the bearer token from.
pub const ACCESS_TOKEN_ENV: &str = "YOUTUBE_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the YouTube Data API v3.
    pub data_api_base: String,
    /// Base URL of the YouTube Analytics API v2.
    pub analytics_api_base: String,
    /// Upper bound on each individual API call.
    pub request_timeout_secs: u64,
    /// Length of the growth window, in days, ending today.
    pub growth_window_days: u32,
    /// Whether to attach the coarse, window-length-based video growth estimate.
    pub estimate_video_growth: bool,
    /// How many of the most recent uploads get a health check.
    pub coached_videos: usize,
    pub goals: Vec<Goal>,
}

/// A target the creator is working towards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub metric: GoalMetric,
    pub target: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            analytics_api_base: "https://youtubeanalytics.googleapis.com/v2".to_string(),
            request_timeout_secs: 15,
            growth_window_days: 28,
            estimate_video_growth: false,
            coached_videos: 10,
            // YouTube Partner Program thresholds
            goals: vec![
                Goal {
                    metric: GoalMetric::Subscribers,
                    target: 1_000.0,
                },
                Goal {
                    metric: GoalMetric::WatchHours,
                    target: 4_000.0,
                },
            ],
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file, or the defaults if the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("check for config file {}", path.display()))?
        {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read config file {}", path.display()))?;
        let config = Self::from_json(&raw)
            .with_context(|| format!("parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    pub fn from_json(raw: &str) -> eyre::Result<Self> {
        let config: Self = serde_json::from_str(raw).context("decode config JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.request_timeout_secs == 0 {
            eyre::bail!("request_timeout_secs must be at least 1");
        }
        if self.growth_window_days == 0 {
            eyre::bail!("growth_window_days must be at least 1");
        }
        for base in [&self.data_api_base, &self.analytics_api_base] {
            if !(base.starts_with("https://") || base.starts_with("http://")) {
                eyre::bail!("API base URL must be http(s): {base}");
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
