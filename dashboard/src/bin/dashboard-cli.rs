use eyre::Context;
use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_creator_dashboard::coach::Coach;
use youtube_creator_dashboard::config::{ACCESS_TOKEN_ENV, Config};
use youtube_creator_dashboard::dashboard::{Dashboard, RefreshOutcome};
use youtube_creator_dashboard::goals::{
    MONETIZATION_VIEWS_WINDOW_DAYS, MONETIZATION_WINDOW_DAYS, fetch_monetization, goal_progress,
};
use youtube_creator_dashboard::metrics::{DateWindow, GrowthMetric};
use youtube_creator_dashboard::session::Session;
use youtube_creator_dashboard::youtube_api::analytics::today_utc;
use youtube_creator_dashboard::youtube_api::{AnalyticsClient, ApiClient};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load("dashboard.json").await?;
    let token = std::env::var(ACCESS_TOKEN_ENV)
        .with_context(|| format!("read bearer token from ${ACCESS_TOKEN_ENV}"))?
        .trim()
        .to_string();
    let api = ApiClient::new(&config).context("build API client")?;
    let session = Session::with_token(token.clone());

    let dashboard = Dashboard::new(&config, api.clone(), session);
    match dashboard.refresh().await {
        RefreshOutcome::Completed | RefreshOutcome::Superseded => {}
        RefreshOutcome::Failed(e) => {
            // whatever loaded before the failure is still worth showing
            eprintln!("warning: {e} ({:?})", e.recovery());
        }
    }

    let state = dashboard.store().snapshot();
    let Some(metrics) = state.metrics else {
        eyre::bail!("could not load channel");
    };

    let snapshot = &metrics.snapshot;
    println!("==> {}", snapshot.title);
    println!("  avatar      : {}", snapshot.thumbnail_url);
    if let Some(banner) = &snapshot.banner_url {
        println!("  banner      : {banner}");
    }
    println!(
        "  subscribers : {}{}",
        snapshot.subscribers,
        growth(metrics.growth.subscribers)
    );
    println!(
        "  views       : {}{}",
        snapshot.total_views,
        growth(metrics.growth.views)
    );
    println!(
        "  videos      : {}{}",
        snapshot.total_videos,
        growth(metrics.growth.videos)
    );
    if metrics.watch_time_known {
        println!(
            "  watch hours : {:.1}{}",
            metrics.total_watch_hours,
            growth(metrics.growth.watch_hours)
        );
    } else {
        println!("  watch hours : pending");
    }
    if let Some(window) = metrics.window {
        println!("  growth over : {} to {}", window.start, window.end);
    }

    println!("==> Goals");
    for goal in goal_progress(&metrics, &config.goals) {
        println!(
            "  {:<12}: {:.0} / {:.0} ({:.0}%)",
            goal.metric.label(),
            goal.current,
            goal.target,
            goal.ratio * 100.0
        );
    }

    let today = today_utc();
    let analytics = AnalyticsClient::new(api.clone());
    match fetch_monetization(&analytics, &token, snapshot.subscribers, today).await {
        Ok(progress) => {
            println!("==> Monetization");
            println!(
                "  subscribers : {:.0} / {:.0}",
                progress.subscribers.current, progress.subscribers.target
            );
            println!(
                "  watch hours : {:.0} / {:.0} (last {MONETIZATION_WINDOW_DAYS} days)",
                progress.watch_hours.current, progress.watch_hours.target
            );
            println!(
                "  views       : {:.0} / {:.0} (last {MONETIZATION_VIEWS_WINDOW_DAYS} days)",
                progress.views.current, progress.views.target
            );
            println!("  eligible    : {}", progress.eligible());
        }
        Err(e) => eprintln!("warning: skipping monetization: {e}"),
    }

    let coach = Coach::new(api, config.coached_videos);
    match coach.review(&token, DateWindow::lifetime(today)).await {
        Ok(report) => {
            println!("==> Coach");
            for video in &report.videos {
                let issue = video.assessment.primary_issue;
                println!(
                    "  [{:>3}] {} ({} views)",
                    video.assessment.score, video.metrics.title, video.metrics.views
                );
                println!("        {}: {}", issue.title(), issue.description());
                if !video.below_benchmark.is_empty() {
                    let short: Vec<&str> =
                        video.below_benchmark.iter().map(|m| m.label()).collect();
                    println!("        below average: {}", short.join(", "));
                }
            }
        }
        Err(e) => eprintln!("warning: skipping coach: {e}"),
    }

    Ok(())
}

fn growth(metric: Option<GrowthMetric>) -> String {
    let Some(metric) = metric else {
        return String::new();
    };
    let estimate = if metric.estimated { ", estimated" } else { "" };
    format!(
        " ({:+} / {:+.1}%{estimate})",
        metric.absolute_delta, metric.percentage
    )
}
