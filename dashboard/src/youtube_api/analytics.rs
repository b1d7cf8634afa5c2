//! YouTube Analytics API v2 `reports.query` types and client.

use crate::error::ApiError;
use crate::metrics::{AnalyticsSample, DateWindow, metric_names};
use crate::youtube_api::client::ApiClient;
use jiff::civil::{Date, date};
use jiff::tz::TimeZone;
use jiff::{Timestamp, Zoned};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

/// Earliest date the lifetime report asks for. YouTube launched in 2005, so nothing predates it.
pub const LIFETIME_START: Date = date(2005, 1, 1);

/// Response structure for the `reports.query` API call.
///
/// See: <https://developers.google.com/youtube/analytics/reference/reports/query>
#[derive(Debug, Deserialize)]
pub struct ReportResponse {
    #[serde(rename = "columnHeaders", default)]
    pub column_headers: Vec<ColumnHeader>,
    /// One entry per row, cells in `column_headers` order. Absent when there is no data.
    #[serde(default)]
    pub rows: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnHeader {
    pub name: String,
    #[serde(rename = "columnType")]
    pub column_type: ColumnType,
    #[serde(rename = "dataType")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Dimension,
    Metric,
}

impl ReportResponse {
    /// Converts the rows into samples, preserving row order.
    pub fn into_samples(self) -> Result<Vec<AnalyticsSample>, ApiError> {
        let rows = self.rows.unwrap_or_default();
        let mut samples = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != self.column_headers.len() {
                return Err(ApiError::Decode(format!(
                    "report row {i} has {} cells but there are {} column headers",
                    row.len(),
                    self.column_headers.len()
                )));
            }

            let mut sample = AnalyticsSample::default();
            for (header, cell) in self.column_headers.iter().zip(row) {
                match header.column_type {
                    ColumnType::Dimension if header.name == "day" => {
                        sample.date = Some(parse_day(&cell)?);
                    }
                    ColumnType::Dimension => {
                        let value = match cell {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        sample.dimensions.push((header.name.clone(), value));
                    }
                    ColumnType::Metric => {
                        sample
                            .metrics
                            .push((header.name.clone(), metric_value(&header.name, &cell)?));
                    }
                }
            }
            samples.push(sample);
        }
        Ok(samples)
    }
}

fn parse_day(cell: &Value) -> Result<Date, ApiError> {
    cell.as_str()
        .and_then(|s| s.parse::<Date>().ok())
        .ok_or_else(|| ApiError::Decode(format!("report day is not a yyyy-MM-dd date: {cell}")))
}

/// Metric cells are JSON numbers. Stringified numbers are accepted and `null` counts as zero.
fn metric_value(name: &str, cell: &Value) -> Result<f64, ApiError> {
    match cell {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ApiError::Decode(format!("metric {name} out of range: {n}"))),
        Value::String(s) => Ok(s.trim().parse::<f64>().unwrap_or(0.0)),
        Value::Null => Ok(0.0),
        other => Err(ApiError::Decode(format!(
            "metric {name} is not numeric: {other}"
        ))),
    }
}

/// Formats a date the way the Analytics API wants it.
pub(crate) fn api_date(day: Date) -> String {
    day.strftime("%Y-%m-%d").to_string()
}

/// Today's date in UTC, which is the calendar the Analytics API reports in.
pub fn today_utc() -> Date {
    Zoned::new(Timestamp::now(), TimeZone::UTC).date()
}

/// Runs reports against the signed-in user's channel.
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    api: ApiClient,
}

impl AnalyticsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Total minutes watched over the channel's whole history.
    ///
    /// A channel without any data yields `0.0`.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/yt-analytics.readonly`
    pub async fn fetch_lifetime_watch_minutes(&self, token: &str) -> Result<f64, ApiError> {
        self.fetch_lifetime_watch_minutes_until(token, today_utc())
            .await
    }

    pub async fn fetch_lifetime_watch_minutes_until(
        &self,
        token: &str,
        end: Date,
    ) -> Result<f64, ApiError> {
        self.fetch_total(
            token,
            metric_names::ESTIMATED_MINUTES_WATCHED,
            DateWindow::lifetime(end),
        )
        .await
    }

    /// Fetches `metric_names` for `start..=end`, optionally broken down by `dimensions`
    /// (e.g. `day`).
    ///
    /// Rows come back in the order the API returns them, which for `day` is chronological.
    /// An empty report is an empty `Vec`, not an error.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/yt-analytics.readonly`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/analytics/reference/reports/query>
    pub async fn fetch_window(
        &self,
        token: &str,
        metric_names: &[&str],
        start: Date,
        end: Date,
        dimensions: Option<&str>,
    ) -> Result<Vec<AnalyticsSample>, ApiError> {
        self.query(token, metric_names, start, end, dimensions, None)
            .await
    }

    /// The sum of one metric over `window`, with no breakdown. A window without data is `0.0`.
    #[instrument(skip(self, token), ret)]
    pub async fn fetch_total(
        &self,
        token: &str,
        metric: &str,
        window: DateWindow,
    ) -> Result<f64, ApiError> {
        let samples = self
            .query(token, &[metric], window.start, window.end, None, None)
            .await?;
        Ok(samples
            .iter()
            .filter_map(|s| s.metric(metric))
            .fold(0.0, |total, value| total + value))
    }

    /// Fetches the per-video report the coach needs for a single video.
    ///
    /// Returns `None` if YouTube has no analytics for the video in the range yet. Rows for any
    /// other video are ignored.
    pub async fn fetch_video_report(
        &self,
        token: &str,
        video_id: &str,
        start: Date,
        end: Date,
    ) -> Result<Option<AnalyticsSample>, ApiError> {
        let filter = format!("video=={video_id}");
        let samples = self
            .query(
                token,
                metric_names::VIDEO_REPORT,
                start,
                end,
                Some("video"),
                Some(&filter),
            )
            .await?;
        Ok(samples
            .into_iter()
            .find(|sample| sample.dimension("video") == Some(video_id)))
    }

    #[instrument(skip(self, token))]
    async fn query(
        &self,
        token: &str,
        metric_names: &[&str],
        start: Date,
        end: Date,
        dimensions: Option<&str>,
        filters: Option<&str>,
    ) -> Result<Vec<AnalyticsSample>, ApiError> {
        let url = self.api.endpoints().analytics("reports");
        let metrics = metric_names.join(",");
        let start_date = api_date(start);
        let end_date = api_date(end);
        let mut query_params = vec![
            ("ids", "channel==MINE"),
            ("startDate", start_date.as_str()),
            ("endDate", end_date.as_str()),
            ("metrics", metrics.as_str()),
        ];
        if let Some(dimensions) = dimensions {
            query_params.push(("dimensions", dimensions));
            if dimensions == "day" {
                query_params.push(("sort", "day"));
            }
        }
        if let Some(filters) = filters {
            query_params.push(("filters", filters));
        }

        let response: ReportResponse = self.api.get_json(token, &url, &query_params).await?;
        let samples = response.into_samples()?;
        tracing::debug!(rows = samples.len(), "fetched analytics report");
        Ok(samples)
    }
}
