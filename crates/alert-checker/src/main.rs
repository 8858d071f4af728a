use std::sync::Arc;

use alert_engine::{AlertConfig, AlertEvaluator, EvaluationSummary, HttpPriceLookup};
use anyhow::{Context, Result};
use price_store::{AlertManager, PriceDb, ProductTracker};
use tokio::signal::unix::SignalKind;
use tokio::time;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let config = AlertConfig::from_env()?;
    tracing::info!("Starting price alert checker");
    tracing::info!("  Backend: {}", config.backend_url);
    tracing::info!("  Check interval: {}s", config.check_interval.as_secs());
    tracing::info!("  Pause between alerts: {}ms", config.pause_between.as_millis());

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:pricewatch.db".to_string());
    let db = PriceDb::new(&database_url)
        .await
        .with_context(|| format!("opening database {database_url}"))?;

    let lookup = HttpPriceLookup::new(&config.backend_url, config.lookup_timeout)?;
    let evaluator = AlertEvaluator::new(
        Arc::new(AlertManager::new(db.clone())),
        Arc::new(ProductTracker::new(db)),
        Arc::new(lookup),
        config.pause_between,
    );

    run_pass(&evaluator).await;
    if config.run_once {
        tracing::info!("Single pass requested, exiting");
        return Ok(());
    }

    let mut interval = time::interval(config.check_interval);
    interval.tick().await;

    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => run_pass(&evaluator).await,
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    tracing::info!("Alert checker shut down.");
    Ok(())
}

async fn run_pass(evaluator: &AlertEvaluator) {
    match evaluator.evaluate().await {
        Ok(summary) => log_summary(&summary),
        Err(e) => tracing::error!("Alert pass failed: {}", e),
    }
}

fn log_summary(summary: &EvaluationSummary) {
    tracing::info!(
        checked = summary.checked,
        refreshed = summary.refreshed,
        price_drops = summary.price_drops,
        notified = summary.notified,
        lookup_failures = summary.lookup_failures,
        errors = summary.errors,
        "Alert check complete"
    );
}
