use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, MarketData, Notifier};
use detector::DetectorConfig;
use notify::TelegramNotifier;
use scanner::{AlertStore, BinanceData, ScanScheduler};

#[tokio::main]
async fn main() -> ExitCode {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config (the only fatal failure mode) ─────────────────────────────────
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!(config = %cfg.summary(), "ReversalBot starting");

    let detector_cfg = match DetectorConfig::from_app(&cfg) {
        Ok(d) => d,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // ── External collaborators ───────────────────────────────────────────────
    let data: Arc<dyn MarketData> =
        Arc::new(BinanceData::new(Duration::from_secs(cfg.request_timeout_secs)));
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(
        cfg.telegram_bot_token.clone(),
        cfg.telegram_chat_id,
    ));

    if let Err(e) = notifier.send_startup().await {
        warn!(error = %e, "Telegram startup message failed, continuing");
    }

    // ── Dedup store (optionally persisted across restarts) ───────────────────
    let alerts = match &cfg.dedup_store_path {
        Some(path) => AlertStore::load_or_default(path, cfg.alert_retention_secs),
        None => AlertStore::new(cfg.alert_retention_secs),
    };

    // ── Scheduler loop ───────────────────────────────────────────────────────
    let scheduler = ScanScheduler::new(cfg, detector_cfg, data, notifier, alerts);

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received. Exiting."),
    }
    ExitCode::SUCCESS
}
