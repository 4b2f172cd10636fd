use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::{PatternType, Result, Span};

/// Identity of one pattern occurrence for dedup purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub symbol: String,
    pub timeframe: String,
    pub pattern_type: PatternType,
    pub span: Span,
}

/// One previously observed pattern occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub symbol: String,
    pub timeframe: String,
    pub pattern_type: PatternType,
    pub span: Span,
    pub first_seen: DateTime<Utc>,
    /// `None` until delivery succeeds, so failed sends retry next cycle.
    pub last_sent: Option<DateTime<Utc>>,
}

impl AlertRecord {
    fn key(&self) -> AlertKey {
        AlertKey {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
            pattern_type: self.pattern_type,
            span: self.span,
        }
    }
}

/// In-memory dedup store owned by the scan scheduler, optionally persisted
/// to a flat JSON file. Records age out after the retention window, after
/// which the same occurrence alerts again.
pub struct AlertStore {
    records: HashMap<AlertKey, AlertRecord>,
    retention: Duration,
}

impl AlertStore {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            records: HashMap::new(),
            retention: Duration::seconds(retention_secs as i64),
        }
    }

    /// Record a detection. Returns true when the occurrence is new (or its
    /// record expired) and should be forwarded to the notifier.
    pub fn should_notify(&mut self, key: &AlertKey, now: DateTime<Utc>) -> bool {
        self.evict(now);
        match self.records.get(key) {
            Some(record) => record.last_sent.is_none(),
            None => {
                self.records.insert(
                    key.clone(),
                    AlertRecord {
                        symbol: key.symbol.clone(),
                        timeframe: key.timeframe.clone(),
                        pattern_type: key.pattern_type,
                        span: key.span,
                        first_seen: now,
                        last_sent: None,
                    },
                );
                true
            }
        }
    }

    /// Mark an alert as delivered.
    pub fn mark_sent(&mut self, key: &AlertKey, now: DateTime<Utc>) {
        if let Some(record) = self.records.get_mut(key) {
            record.last_sent = Some(now);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let retention = self.retention;
        self.records.retain(|_, r| {
            let reference = r.last_sent.unwrap_or(r.first_seen);
            now - reference < retention
        });
    }

    /// Load a previously saved store; a missing or unreadable file yields an
    /// empty store with a warning (duplicate alerts may resume, never fatal).
    pub fn load_or_default(path: &str, retention_secs: u64) -> Self {
        let mut store = Self::new(retention_secs);
        if !Path::new(path).exists() {
            return store;
        }
        match std::fs::read_to_string(path)
            .map_err(common::Error::from)
            .and_then(|raw| Ok(serde_json::from_str::<Vec<AlertRecord>>(&raw)?))
        {
            Ok(records) => {
                debug!(path, count = records.len(), "loaded dedup store");
                for record in records {
                    store.records.insert(record.key(), record);
                }
            }
            Err(e) => warn!(path, error = %e, "failed to load dedup store, starting empty"),
        }
        store
    }

    /// Persist all records as a flat JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let records: Vec<&AlertRecord> = self.records.values().collect();
        let raw = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(symbol: &str, span: Span) -> AlertKey {
        AlertKey {
            symbol: symbol.into(),
            timeframe: "1h".into(),
            pattern_type: PatternType::DoubleTop,
            span,
        }
    }

    #[test]
    fn repeat_detection_is_suppressed_after_send() {
        let mut store = AlertStore::new(3600);
        let k = key("BTCUSDT", Span::new(5, 12));
        let now = Utc::now();

        assert!(store.should_notify(&k, now));
        store.mark_sent(&k, now);
        assert!(!store.should_notify(&k, now + Duration::seconds(60)));
    }

    #[test]
    fn unsent_alert_retries_next_cycle() {
        let mut store = AlertStore::new(3600);
        let k = key("BTCUSDT", Span::new(5, 12));
        let now = Utc::now();

        assert!(store.should_notify(&k, now));
        // delivery failed: no mark_sent
        assert!(store.should_notify(&k, now + Duration::seconds(60)));
    }

    #[test]
    fn distinct_spans_are_distinct_occurrences() {
        let mut store = AlertStore::new(3600);
        let now = Utc::now();
        let a = key("BTCUSDT", Span::new(5, 12));
        let b = key("BTCUSDT", Span::new(12, 20));

        assert!(store.should_notify(&a, now));
        store.mark_sent(&a, now);
        assert!(store.should_notify(&b, now));
    }

    #[test]
    fn records_age_out_after_retention() {
        let mut store = AlertStore::new(3600);
        let k = key("ETHUSDT", Span::new(0, 9));
        let now = Utc::now();

        assert!(store.should_notify(&k, now));
        store.mark_sent(&k, now);
        assert!(!store.should_notify(&k, now + Duration::seconds(3599)));
        assert!(store.should_notify(&k, now + Duration::seconds(3601)));
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let path = std::env::temp_dir().join(format!("alerts-test-{}.json", std::process::id()));
        let path = path.to_str().unwrap().to_string();

        let mut store = AlertStore::new(3600);
        let k = key("BTCUSDT", Span::new(5, 12));
        let now = Utc::now();
        assert!(store.should_notify(&k, now));
        store.mark_sent(&k, now);
        store.save(&path).unwrap();

        let mut reloaded = AlertStore::load_or_default(&path, 3600);
        assert_eq!(reloaded.len(), 1);
        assert!(!reloaded.should_notify(&k, now + Duration::seconds(60)));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = AlertStore::load_or_default("/nonexistent/alerts.json", 3600);
        assert!(store.is_empty());
    }
}
