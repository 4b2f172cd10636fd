use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use common::{Config, Error, MarketData, Notifier, Result};
use detector::DetectorConfig;

use crate::alerts::{AlertKey, AlertStore};

/// Maximum backoff a failing unit can accumulate.
const MAX_BACKOFF_SECS: u64 = 900;

/// Lifecycle of one (symbol, timeframe) unit within a scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitState {
    #[default]
    Idle,
    Fetching,
    Detecting,
    Notifying,
    Failed,
}

#[derive(Debug, Default)]
struct UnitStatus {
    state: UnitState,
    failures: u32,
    backoff_until: Option<DateTime<Utc>>,
}

/// Drives the periodic scan over all configured (symbol, timeframe) units.
///
/// The detector itself is pure; the only shared mutable state here is the
/// alert dedup store and the per-unit status map, both mutex-guarded so
/// units can be fanned out concurrently.
pub struct ScanScheduler {
    cfg: Config,
    detector_cfg: DetectorConfig,
    data: Arc<dyn MarketData>,
    notifier: Arc<dyn Notifier>,
    alerts: Mutex<AlertStore>,
    units: Mutex<HashMap<(String, String), UnitStatus>>,
}

impl ScanScheduler {
    pub fn new(
        cfg: Config,
        detector_cfg: DetectorConfig,
        data: Arc<dyn MarketData>,
        notifier: Arc<dyn Notifier>,
        alerts: AlertStore,
    ) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            detector_cfg,
            data,
            notifier,
            alerts: Mutex::new(alerts),
            units: Mutex::new(HashMap::new()),
        })
    }

    /// Main loop: scan every unit, persist the dedup store if configured,
    /// sleep until the next interval. Never terminates on a unit failure.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.cfg.scan_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pass = 0u64;
        loop {
            ticker.tick().await;
            pass += 1;
            info!(pass, "starting market scan");
            self.scan_all().await;

            if let Some(path) = &self.cfg.dedup_store_path {
                let store = self.alerts.lock().await;
                if let Err(e) = store.save(path) {
                    warn!(path, error = %e, "failed to persist dedup store");
                }
            }
            info!(pass, "market scan completed");
        }
    }

    /// One full pass over all units, sequential by default or bounded-
    /// concurrent when `MAX_CONCURRENT_SCANS > 1`.
    pub async fn scan_all(self: &Arc<Self>) {
        let pairs: Vec<(String, String)> = self
            .cfg
            .symbols
            .iter()
            .flat_map(|s| self.cfg.timeframes.iter().map(move |tf| (s.clone(), tf.clone())))
            .collect();

        if self.cfg.max_concurrent_scans <= 1 {
            for (symbol, timeframe) in pairs {
                self.scan_unit(&symbol, &timeframe).await;
            }
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.cfg.max_concurrent_scans));
        let mut tasks = JoinSet::new();
        for (symbol, timeframe) in pairs {
            let this = Arc::clone(self);
            let permit_source = Arc::clone(&semaphore);
            tasks.spawn(async move {
                if let Ok(_permit) = permit_source.acquire_owned().await {
                    this.scan_unit(&symbol, &timeframe).await;
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    async fn scan_unit(&self, symbol: &str, timeframe: &str) {
        if self.in_backoff(symbol, timeframe).await {
            debug!(symbol, timeframe, "unit in backoff, skipping");
            return;
        }

        match self.run_cycle(symbol, timeframe).await {
            Ok(()) => self.record_success(symbol, timeframe).await,
            Err(e) => self.record_failure(symbol, timeframe, &e).await,
        }
    }

    /// IDLE → FETCHING → DETECTING → NOTIFYING → IDLE for one unit.
    async fn run_cycle(&self, symbol: &str, timeframe: &str) -> Result<()> {
        let call_timeout = Duration::from_secs(self.cfg.request_timeout_secs);

        self.set_state(symbol, timeframe, UnitState::Fetching).await;
        let series = match timeout(
            call_timeout,
            self.data
                .get_series(symbol, timeframe, self.cfg.lookback_periods),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::DataUnavailable(format!(
                    "timed out fetching {symbol} {timeframe}"
                )))
            }
        };
        if !series.is_well_formed() {
            return Err(Error::DataUnavailable(format!(
                "malformed series for {symbol} {timeframe}"
            )));
        }

        self.set_state(symbol, timeframe, UnitState::Detecting).await;
        let matches = detector::scan(&series, &self.detector_cfg);
        if matches.is_empty() {
            debug!(symbol, timeframe, "no patterns found");
            self.set_state(symbol, timeframe, UnitState::Idle).await;
            return Ok(());
        }

        self.set_state(symbol, timeframe, UnitState::Notifying).await;
        let current_price = match timeout(call_timeout, self.data.current_price(symbol)).await {
            Ok(Ok(price)) => price,
            // last close is an acceptable stand-in for the alert text
            _ => series.last_close().unwrap_or_default(),
        };

        for m in &matches {
            let key = AlertKey {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                pattern_type: m.pattern_type,
                span: m.span,
            };

            let fresh = self.alerts.lock().await.should_notify(&key, Utc::now());
            if !fresh {
                debug!(symbol, timeframe, pattern = %m.pattern_type, span = %m.span, "suppressing repeat alert");
                continue;
            }

            match timeout(
                call_timeout,
                self.notifier
                    .send_pattern_alert(m, symbol, timeframe, current_price),
            )
            .await
            {
                Ok(Ok(())) => {
                    self.alerts.lock().await.mark_sent(&key, Utc::now());
                    info!(
                        symbol,
                        timeframe,
                        pattern = %m.pattern_type,
                        confidence = format!("{:.0}%", m.confidence * 100.0),
                        "alert sent"
                    );
                }
                Ok(Err(e)) => {
                    warn!(symbol, timeframe, pattern = %m.pattern_type, error = %e, "alert delivery failed, retrying next cycle");
                }
                Err(_) => {
                    warn!(symbol, timeframe, pattern = %m.pattern_type, "alert delivery timed out, retrying next cycle");
                }
            }
        }

        self.set_state(symbol, timeframe, UnitState::Idle).await;
        Ok(())
    }

    /// Snapshot of per-unit states, for status logging and tests.
    pub async fn unit_states(&self) -> HashMap<(String, String), UnitState> {
        self.units
            .lock()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.state))
            .collect()
    }

    async fn in_backoff(&self, symbol: &str, timeframe: &str) -> bool {
        let units = self.units.lock().await;
        units
            .get(&(symbol.to_string(), timeframe.to_string()))
            .and_then(|u| u.backoff_until)
            .is_some_and(|until| Utc::now() < until)
    }

    async fn set_state(&self, symbol: &str, timeframe: &str, state: UnitState) {
        let mut units = self.units.lock().await;
        let unit = units
            .entry((symbol.to_string(), timeframe.to_string()))
            .or_default();
        unit.state = state;
    }

    async fn record_success(&self, symbol: &str, timeframe: &str) {
        let mut units = self.units.lock().await;
        let unit = units
            .entry((symbol.to_string(), timeframe.to_string()))
            .or_default();
        unit.state = UnitState::Idle;
        unit.failures = 0;
        unit.backoff_until = None;
    }

    async fn record_failure(&self, symbol: &str, timeframe: &str, error: &Error) {
        let first_failure;
        {
            let mut units = self.units.lock().await;
            let unit = units
                .entry((symbol.to_string(), timeframe.to_string()))
                .or_default();
            unit.state = UnitState::Failed;
            unit.failures += 1;
            first_failure = unit.failures == 1;

            let backoff = (self.cfg.scan_interval_secs << (unit.failures - 1).min(16))
                .min(MAX_BACKOFF_SECS);
            unit.backoff_until = Some(Utc::now() + chrono::Duration::seconds(backoff as i64));
            warn!(symbol, timeframe, failures = unit.failures, backoff_secs = backoff, error = %error, "scan unit failed");
        }

        if first_failure {
            let text = format!("Scan failed for {symbol} {timeframe}: {error}");
            if let Err(e) = self.notifier.send_error(&text).await {
                warn!(error = %e, "failed to deliver error alert");
            }
        }
    }
}
