use crate::{Error, Result};

const VALID_TIMEFRAMES: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
];

/// All configuration loaded from environment variables at startup.
/// Any missing or invalid required option is fatal (`Error::Config`).
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_chat_id: i64,

    // Scan targets
    pub symbols: Vec<String>,
    pub timeframes: Vec<String>,

    // Pattern detection
    pub pattern_tolerance: f64,
    pub min_confidence: f64,
    /// Swing-point lookback radius; `None` = proportional to series length.
    pub swing_window: Option<usize>,

    // Scheduler
    pub scan_interval_secs: u64,
    pub lookback_periods: usize,
    pub max_concurrent_scans: usize,
    pub alert_retention_secs: u64,
    pub request_timeout_secs: u64,

    // Optional flat-file persistence of the dedup store
    pub dedup_store_path: Option<String>,
    // Optional TOML file enabling a subset of pattern families
    pub patterns_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let telegram_chat_id = required_env("TELEGRAM_CHAT_ID")?
            .parse::<i64>()
            .map_err(|_| Error::Config("TELEGRAM_CHAT_ID must be a numeric chat ID".into()))?;

        let symbols = parse_list(&optional_env("SYMBOLS").unwrap_or_else(|| "BTCUSDT".into()));
        if symbols.is_empty() {
            return Err(Error::Config("SYMBOLS must not be empty".into()));
        }

        let timeframes =
            parse_list(&optional_env("TIMEFRAMES").unwrap_or_else(|| "15m,1h,4h".into()));
        if timeframes.is_empty() {
            return Err(Error::Config("TIMEFRAMES must not be empty".into()));
        }
        for tf in &timeframes {
            if !VALID_TIMEFRAMES.contains(&tf.as_str()) {
                return Err(Error::Config(format!("unsupported timeframe '{tf}'")));
            }
        }

        let pattern_tolerance = parse_f64("PATTERN_TOLERANCE", 0.02)?;
        if !(0.0..1.0).contains(&pattern_tolerance) || pattern_tolerance == 0.0 {
            return Err(Error::Config(
                "PATTERN_TOLERANCE must be a fraction in (0, 1)".into(),
            ));
        }

        let min_confidence = parse_f64("MIN_CONFIDENCE", 0.7)?;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(Error::Config("MIN_CONFIDENCE must be in [0, 1]".into()));
        }

        let scan_interval_secs = parse_u64("SCAN_INTERVAL", 60)?;
        if scan_interval_secs == 0 {
            return Err(Error::Config("SCAN_INTERVAL must be at least 1 second".into()));
        }

        Ok(Config {
            telegram_bot_token: required_env("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id,
            symbols,
            timeframes,
            pattern_tolerance,
            min_confidence,
            swing_window: match optional_env("SWING_WINDOW") {
                Some(v) => Some(v.parse::<usize>().map_err(|_| {
                    Error::Config("SWING_WINDOW must be a positive integer".into())
                })?),
                None => None,
            },
            scan_interval_secs,
            lookback_periods: parse_u64("LOOKBACK_PERIODS", 100)? as usize,
            max_concurrent_scans: parse_u64("MAX_CONCURRENT_SCANS", 1)?.max(1) as usize,
            alert_retention_secs: parse_u64("ALERT_RETENTION_SECS", 21_600)?,
            request_timeout_secs: parse_u64("REQUEST_TIMEOUT_SECS", 10)?,
            dedup_store_path: optional_env("DEDUP_STORE_PATH"),
            patterns_config_path: optional_env("PATTERNS_CONFIG_PATH"),
        })
    }

    /// Startup summary without credentials.
    pub fn summary(&self) -> String {
        format!(
            "symbols={} timeframes={} tolerance={:.1}% min_confidence={:.0}% interval={}s lookback={} concurrency={}",
            self.symbols.join(","),
            self.timeframes.join(","),
            self.pattern_tolerance * 100.0,
            self.min_confidence * 100.0,
            self.scan_interval_secs,
            self.lookback_periods,
            self.max_concurrent_scans,
        )
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| Error::Config(format!("required environment variable '{key}' is not set")))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Split a comma-separated list, trimming blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_f64(key: &str, default: f64) -> Result<f64> {
    match optional_env(key) {
        Some(v) => v
            .parse::<f64>()
            .map_err(|_| Error::Config(format!("{key} must be a number, got '{v}'"))),
        None => Ok(default),
    }
}

fn parse_u64(key: &str, default: u64) -> Result<u64> {
    match optional_env(key) {
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("{key} must be an integer, got '{v}'"))),
        None => Ok(default),
    }
}
