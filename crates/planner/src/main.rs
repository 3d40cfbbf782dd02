//! `gardes-planner` -- renders one month of the shift planning.
//!
//! Loads the engine configuration from the environment, shows the
//! requested month through a [`PlanningSession`], waits for the
//! background prefetches and prints the calendar view as JSON on stdout.
//! Notifications are logged as they are published.
//!
//! # Environment variables
//!
//! | Variable         | Required | Default       | Description                 |
//! |------------------|----------|---------------|-----------------------------|
//! | `PLANNING_YEAR`  | no       | current year  | Year of the month to render |
//! | `PLANNING_MONTH` | no       | current month | Month to render (1-12)      |
//!
//! plus every `PLANNING_*` variable read by [`EngineConfig::from_env`].

use std::sync::Arc;

use chrono::{Datelike, Local};
use gardes_client::HttpBackend;
use gardes_core::MonthKey;
use gardes_engine::{EngineConfig, PlanningSession, SessionParts};
use gardes_events::NotificationLevel;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gardes_planner=info,gardes_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    let month = requested_month().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid month");
        std::process::exit(1);
    });

    let backend = HttpBackend::with_timeout(&config.api_url, config.request_timeout)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        });

    tracing::info!(
        api_url = %config.api_url,
        month = %month,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        prefetch = config.prefetch,
        "Starting gardes-planner",
    );

    let cancel = CancellationToken::new();
    let (parts, idle_worker) = SessionParts::standard(cancel.clone());
    let mut notifications = parts.notifier.subscribe();
    let mut session = PlanningSession::new(config, Arc::new(backend), parts);

    let logger = tokio::spawn(async move {
        while let Ok(n) = notifications.recv().await {
            match n.level {
                NotificationLevel::Error => tracing::error!(shift_id = n.shift_id, "{}", n.message),
                NotificationLevel::Warning => tracing::warn!(shift_id = n.shift_id, "{}", n.message),
                NotificationLevel::Info | NotificationLevel::Success => {
                    tracing::info!(shift_id = n.shift_id, "{}", n.message)
                }
            }
        }
    });

    let exit_code = match session.show_month(month).await {
        Ok(outcome) => {
            tracing::info!(
                month = %outcome.month,
                source = ?outcome.source,
                shifts = session.view().shift_count(),
                "Month rendered",
            );
            while let Some(effect) = session.next_completion().await {
                tracing::debug!(?effect, "Background fetch applied");
            }
            match serde_json::to_string_pretty(session.view()) {
                Ok(json) => {
                    println!("{json}");
                    0
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode calendar view");
                    1
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to render month");
            1
        }
    };

    cancel.cancel();
    let _ = idle_worker.await;
    drop(session);
    let _ = logger.await;
    std::process::exit(exit_code);
}

/// `PLANNING_YEAR` / `PLANNING_MONTH`, defaulting to today.
fn requested_month() -> Result<MonthKey, String> {
    let today = Local::now().date_naive();
    let year = match std::env::var("PLANNING_YEAR") {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| format!("PLANNING_YEAR must be an integer, got '{v}'"))?,
        Err(_) => today.year(),
    };
    let month = match std::env::var("PLANNING_MONTH") {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| format!("PLANNING_MONTH must be an integer, got '{v}'"))?,
        Err(_) => today.month(),
    };
    MonthKey::new(year, month).map_err(|e| e.to_string())
}
