//! The dashboard's view state and the refresh cycle that fills it.
//!
//! All writes to [`DashboardState`] go through [`DashboardStore`], which serializes them and
//! tags them with the refresh generation they belong to. Starting a refresh bumps the
//! generation, so anything still in flight from an older refresh is discarded when it lands
//! instead of overwriting newer data.

use crate::config::Config;
use crate::error::{ApiError, Recovery};
use crate::metrics::{
    ChannelMetrics, ChannelSnapshot, DateWindow, MetricsAggregator, WindowReport, metric_names,
};
use crate::session::TokenProvider;
use crate::youtube_api::analytics::today_utc;
use crate::youtube_api::{AnalyticsClient, ApiClient, ChannelStatsClient};
use jiff::Timestamp;
use jiff::civil::Date;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

/// A non-blocking message for the user, plus what they can do about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub message: String,
    pub recovery: Recovery,
}

impl From<&ApiError> for Alert {
    fn from(e: &ApiError) -> Self {
        Self {
            message: e.to_string(),
            recovery: e.recovery(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardState {
    /// `None` until the first successful channel fetch, and again after sign-out.
    pub metrics: Option<ChannelMetrics>,
    pub is_loading: bool,
    pub alert: Option<Alert>,
    /// The most recently started refresh.
    pub generation: u64,
}

/// Single-writer container for [`DashboardState`]. Readers subscribe to changes.
#[derive(Debug)]
pub struct DashboardStore {
    state: watch::Sender<DashboardState>,
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self { state }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Starts a new generation, which makes every older one stale.
    pub fn begin_refresh(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.is_loading = true;
            generation = state.generation;
        });
        generation
    }

    /// Applies `update` if `generation` is still the latest one.
    ///
    /// Returns `false`, leaving the state untouched, if a newer refresh has started since.
    pub fn apply(&self, generation: u64, update: impl FnOnce(&mut DashboardState)) -> bool {
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                tracing::debug!(
                    stale = generation,
                    current = state.generation,
                    "refresh superseded - discarding results"
                );
                return false;
            }
            update(state);
            true
        })
    }

    /// Forgets everything about the channel and invalidates any refresh in flight.
    pub fn clear_for_revocation(&self) {
        self.state.send_modify(|state| {
            *state = DashboardState {
                generation: state.generation + 1,
                ..DashboardState::default()
            };
        });
        tracing::info!("sign-in revoked, cleared dashboard");
    }
}

/// How a call to [`Dashboard::refresh`] ended.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Every stage finished and was published.
    Completed,
    /// A fetch failed. Whatever was published before the failure stays, and the state carries
    /// an alert.
    Failed(ApiError),
    /// A newer refresh or a sign-out started while this one was running.
    Superseded,
}

enum Stage {
    Published,
    Stale,
}

/// Fetches channel data and publishes it to a [`DashboardStore`].
#[derive(Debug)]
pub struct Dashboard<P> {
    tokens: P,
    channels: ChannelStatsClient,
    analytics: AnalyticsClient,
    aggregator: MetricsAggregator,
    growth_window_days: u32,
    store: Arc<DashboardStore>,
}

impl<P: TokenProvider> Dashboard<P> {
    pub fn new(config: &Config, api: ApiClient, tokens: P) -> Self {
        Self {
            tokens,
            channels: ChannelStatsClient::new(api.clone()),
            analytics: AnalyticsClient::new(api),
            aggregator: MetricsAggregator::new(config.estimate_video_growth),
            growth_window_days: config.growth_window_days,
            store: Arc::new(DashboardStore::new()),
        }
    }

    pub fn store(&self) -> &DashboardStore {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.store.subscribe()
    }

    /// Refreshes with the growth window ending today (UTC).
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_as_of(today_utc()).await
    }

    /// Fetches the channel snapshot, then lifetime watch time, then the growth window ending
    /// `today`, publishing the re-aggregated metrics after each step.
    #[instrument(skip(self))]
    pub async fn refresh_as_of(&self, today: Date) -> RefreshOutcome {
        let generation = self.store.begin_refresh();
        match self.load(generation, today).await {
            Ok(Stage::Stale) => RefreshOutcome::Superseded,
            Ok(Stage::Published) => {
                let current = self.store.apply(generation, |state| {
                    state.is_loading = false;
                    state.alert = None;
                });
                if current {
                    tracing::debug!(generation, "refresh complete");
                    RefreshOutcome::Completed
                } else {
                    RefreshOutcome::Superseded
                }
            }
            Err(e) => {
                let alert = Alert::from(&e);
                let current = self.store.apply(generation, |state| {
                    state.is_loading = false;
                    state.alert = Some(alert);
                });
                if current {
                    tracing::warn!(generation, error = %e, "refresh failed");
                    RefreshOutcome::Failed(e)
                } else {
                    RefreshOutcome::Superseded
                }
            }
        }
    }

    async fn load(&self, generation: u64, today: Date) -> Result<Stage, ApiError> {
        let token = self.tokens.bearer_token().await?;

        let snapshot = self.channels.fetch(&token).await?;
        if let Stage::Stale = self.publish(generation, &snapshot, None, None) {
            return Ok(Stage::Stale);
        }

        let lifetime_minutes = self
            .analytics
            .fetch_lifetime_watch_minutes_until(&token, today)
            .await?;
        if let Stage::Stale = self.publish(generation, &snapshot, Some(lifetime_minutes), None) {
            return Ok(Stage::Stale);
        }

        let window = DateWindow::last_days(self.growth_window_days, today);
        let samples = self
            .analytics
            .fetch_window(
                &token,
                metric_names::GROWTH,
                window.start,
                window.end,
                Some("day"),
            )
            .await?;
        let report = WindowReport { window, samples };
        Ok(self.publish(generation, &snapshot, Some(lifetime_minutes), Some(&report)))
    }

    fn publish(
        &self,
        generation: u64,
        snapshot: &ChannelSnapshot,
        lifetime_minutes: Option<f64>,
        window: Option<&WindowReport>,
    ) -> Stage {
        let metrics = self
            .aggregator
            .aggregate(snapshot, lifetime_minutes, window, Timestamp::now());
        if self.store.apply(generation, |state| state.metrics = Some(metrics)) {
            Stage::Published
        } else {
            Stage::Stale
        }
    }

    /// Drops all cached channel data, returning the dashboard to its signed-out state.
    pub fn handle_revocation(&self) {
        self.store.clear_for_revocation();
    }

    /// Calls [`Dashboard::handle_revocation`] whenever `tokens` changes to signed out.
    ///
    /// The task ends when the sender side of `tokens` is dropped.
    pub fn watch_revocations(&self, mut tokens: watch::Receiver<Option<String>>) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            while tokens.changed().await.is_ok() {
                let signed_out = tokens.borrow_and_update().is_none();
                if signed_out {
                    store.clear_for_revocation();
                }
            }
            tracing::debug!("session dropped, no longer watching for revocation");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Trend;
    use crate::session::Session;
    use crate::test_support::{MockServer, Reply};
    use float_cmp::approx_eq;
    use jiff::civil::date;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn channel(title: &str, subscribers: u64) -> String {
        format!(
            r#"{{"items": [{{
              "id": "UC1",
              "snippet": {{"title": "{title}", "thumbnails": {{"default": {{"url": "https://yt3.example/d.jpg"}}}}}},
              "statistics": {{"viewCount": "40000", "subscriberCount": "{subscribers}", "videoCount": "12"}}
            }}]}}"#
        )
    }

    const LIFETIME: &str = r#"{
      "columnHeaders": [{"name": "estimatedMinutesWatched", "columnType": "METRIC"}],
      "rows": [[12000]]
    }"#;

    const DAILY: &str = r#"{
      "columnHeaders": [
        {"name": "day", "columnType": "DIMENSION"},
        {"name": "views", "columnType": "METRIC"},
        {"name": "estimatedMinutesWatched", "columnType": "METRIC"},
        {"name": "subscribersGained", "columnType": "METRIC"},
        {"name": "subscribersLost", "columnType": "METRIC"}
      ],
      "rows": [["2025-06-01", 1500, 600, 12, 2], ["2025-06-02", 500, 600, 0, 0]]
    }"#;

    fn healthy_api(path: &str, query: &[(String, String)]) -> Reply {
        let by_day = query.iter().any(|(k, v)| k == "dimensions" && v == "day");
        match path {
            "/youtube/v3/channels" => Reply::json(200, channel("Rust Cooking", 500)),
            "/v2/reports" if by_day => Reply::json(200, DAILY),
            "/v2/reports" => Reply::json(200, LIFETIME),
            _ => Reply::json(404, "{}"),
        }
    }

    fn dashboard(server: &MockServer, session: Session) -> Dashboard<Session> {
        Dashboard::new(&server.config(), server.client(), session)
    }

    #[tokio::test]
    async fn full_refresh() {
        let server = MockServer::start(healthy_api).await;
        let dashboard = dashboard(&server, Session::with_token("tok"));

        let outcome = dashboard.refresh_as_of(date(2025, 6, 28)).await;
        assert!(matches!(outcome, RefreshOutcome::Completed));

        let state = dashboard.store().snapshot();
        assert_eq!(state.generation, 1);
        assert!(!state.is_loading);
        assert_eq!(state.alert, None);

        let metrics = state.metrics.unwrap();
        assert_eq!(metrics.snapshot.title, "Rust Cooking");
        assert_eq!(metrics.snapshot.subscribers, 500);
        assert!(approx_eq!(f64, metrics.total_watch_hours, 200.0, ulps = 2));
        let subs = metrics.growth.subscribers.unwrap();
        assert_eq!(subs.absolute_delta, 10);
        assert_eq!(subs.trend, Trend::Up);
        assert_eq!(metrics.growth.views.unwrap().absolute_delta, 2_000);
        assert_eq!(metrics.growth.watch_hours.unwrap().absolute_delta, 20);
        assert_eq!(metrics.growth.videos, None);
        assert_eq!(
            metrics.window,
            Some(DateWindow {
                start: date(2025, 6, 1),
                end: date(2025, 6, 28)
            })
        );

        let requests = server.requests();
        let paths: Vec<&str> = requests.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/youtube/v3/channels", "/v2/reports", "/v2/reports"]);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer tok"));
        assert_eq!(requests[2].param("startDate"), Some("2025-06-01"));
    }

    #[tokio::test]
    async fn publishes_partial_state_first() {
        let server = MockServer::start(|path, query| match path {
            "/v2/reports" => healthy_api(path, query).delayed(Duration::from_millis(100)),
            _ => healthy_api(path, query),
        })
        .await;
        let dashboard = dashboard(&server, Session::with_token("tok"));
        let mut updates = dashboard.subscribe();

        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while updates.changed().await.is_ok() {
                let state = updates.borrow_and_update().clone();
                let done = !state.is_loading;
                seen.push(state);
                if done {
                    break;
                }
            }
            seen
        });

        dashboard.refresh_as_of(date(2025, 6, 28)).await;
        let seen = watcher.await.unwrap();
        let first_with_metrics = seen
            .iter()
            .find_map(|s| s.metrics.as_ref())
            .unwrap();
        assert_eq!(first_with_metrics.snapshot.title, "Rust Cooking");
        assert!(!first_with_metrics.watch_time_known);
        assert_eq!(first_with_metrics.growth.subscribers, None);
    }

    #[tokio::test]
    async fn stale_refresh_is_discarded() {
        let channel_calls = Arc::new(AtomicUsize::new(0));
        let server = MockServer::start({
            let channel_calls = Arc::clone(&channel_calls);
            move |path, query| match path {
                "/youtube/v3/channels" => {
                    if channel_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Reply::json(200, channel("Old Name", 1)).delayed(Duration::from_millis(300))
                    } else {
                        Reply::json(200, channel("New Name", 2))
                    }
                }
                _ => healthy_api(path, query),
            }
        })
        .await;
        let dashboard = dashboard(&server, Session::with_token("tok"));
        let today = date(2025, 6, 28);

        let (first, second) = tokio::join!(dashboard.refresh_as_of(today), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            dashboard.refresh_as_of(today).await
        });
        assert!(matches!(first, RefreshOutcome::Superseded));
        assert!(matches!(second, RefreshOutcome::Completed));

        let state = dashboard.store().snapshot();
        assert_eq!(state.generation, 2);
        assert!(!state.is_loading);
        assert_eq!(state.metrics.unwrap().snapshot.title, "New Name");
    }

    #[test]
    fn store_rejects_older_generation() {
        let store = DashboardStore::new();
        let first = store.begin_refresh();
        let second = store.begin_refresh();
        assert!(store.apply(second, |s| s.is_loading = false));
        assert!(!store.apply(first, |s| {
            s.alert = Some(Alert {
                message: "late".to_string(),
                recovery: Recovery::Retry,
            })
        }));
        let state = store.snapshot();
        assert_eq!(state.generation, second);
        assert_eq!(state.alert, None);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn failure_keeps_previous_metrics() {
        let broken = Arc::new(AtomicBool::new(false));
        let server = MockServer::start({
            let broken = Arc::clone(&broken);
            move |path, query| {
                if broken.load(Ordering::SeqCst) {
                    Reply::json(503, r#"{"error": {"code": 503, "message": "Backend Error"}}"#)
                } else {
                    healthy_api(path, query)
                }
            }
        })
        .await;
        let dashboard = dashboard(&server, Session::with_token("tok"));
        let today = date(2025, 6, 28);

        assert!(matches!(dashboard.refresh_as_of(today).await, RefreshOutcome::Completed));
        let before = dashboard.store().snapshot().metrics;
        assert!(before.is_some());

        broken.store(true, Ordering::SeqCst);
        let outcome = dashboard.refresh_as_of(today).await;
        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(ApiError::Network { status: Some(503), .. })
        ));

        let state = dashboard.store().snapshot();
        assert_eq!(state.metrics, before);
        assert!(!state.is_loading);
        let alert = state.alert.unwrap();
        assert_eq!(alert.recovery, Recovery::Retry);
        assert!(alert.message.contains("Backend Error"), "{}", alert.message);
    }

    #[tokio::test]
    async fn first_failure_has_no_metrics() {
        let server = MockServer::start(|_, _| {
            Reply::json(401, r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#)
        })
        .await;
        let dashboard = dashboard(&server, Session::with_token("expired"));

        let outcome = dashboard.refresh_as_of(date(2025, 6, 28)).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(ApiError::Auth(_))));
        let state = dashboard.store().snapshot();
        assert_eq!(state.metrics, None);
        assert_eq!(state.alert.unwrap().recovery, Recovery::SignIn);
    }

    #[tokio::test]
    async fn signed_out_makes_no_requests() {
        let server = MockServer::start(healthy_api).await;
        let dashboard = dashboard(&server, Session::signed_out());

        let outcome = dashboard.refresh_as_of(date(2025, 6, 28)).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(ApiError::Auth(_))));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn revocation_clears_state() {
        let server = MockServer::start(healthy_api).await;
        let session = Arc::new(Session::with_token("tok"));
        let dashboard = Dashboard::new(&server.config(), server.client(), Arc::clone(&session));
        let watcher = dashboard.watch_revocations(session.subscribe());

        dashboard.refresh_as_of(date(2025, 6, 28)).await;
        assert!(dashboard.store().snapshot().metrics.is_some());

        let mut updates = dashboard.subscribe();
        updates.borrow_and_update();
        session.revoke();
        updates.changed().await.unwrap();

        let state = dashboard.store().snapshot();
        assert_eq!(state.metrics, None);
        assert_eq!(state.alert, None);
        assert!(!state.is_loading);
        assert_eq!(state.generation, 2);

        let outcome = dashboard.refresh_as_of(date(2025, 6, 28)).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(ApiError::Auth(_))));
        watcher.abort();
    }

    #[tokio::test]
    async fn handle_revocation_forgets_channel() {
        let server = MockServer::start(healthy_api).await;
        let dashboard = dashboard(&server, Session::with_token("tok"));
        dashboard.refresh_as_of(date(2025, 6, 28)).await;
        let before = dashboard.store().snapshot();
        assert!(before.metrics.is_some());

        dashboard.handle_revocation();

        let state = dashboard.store().snapshot();
        assert_eq!(state.metrics, None);
        assert_eq!(state.alert, None);
        assert!(!state.is_loading);
        assert_eq!(state.generation, before.generation + 1);
    }

    #[test]
    fn revocation_invalidates_in_flight_refresh() {
        let store = DashboardStore::new();
        let generation = store.begin_refresh();
        store.clear_for_revocation();
        assert!(!store.apply(generation, |s| s.is_loading = true));
        assert_eq!(store.snapshot().metrics, None);
    }
}
