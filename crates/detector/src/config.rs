use serde::Deserialize;

use common::{Error, Result};

use crate::matchers::PatternFamily;

/// Tunables for one engine scan. Built from the application config, with an
/// optional TOML pattern file layered on top.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Price tolerance for level matching, as a fraction (0.02 = 2%).
    pub tolerance: f64,
    /// Matches below this score are discarded inside the matchers.
    pub min_confidence: f64,
    /// Swing extraction lookback radius; `None` = proportional to length.
    pub swing_window: Option<usize>,
    /// Detection is skipped entirely below this series length.
    pub min_series_len: usize,
    /// Relative move that qualifies as a spike leg.
    pub spike_threshold: f64,
    /// Maximum bar span of one spike leg.
    pub spike_max_span: usize,
    /// Which matcher families run. Defaults to the whole catalogue.
    pub enabled: Vec<PatternFamily>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.02,
            min_confidence: 0.7,
            swing_window: None,
            min_series_len: 20,
            spike_threshold: 0.05,
            spike_max_span: 5,
            enabled: PatternFamily::ALL.to_vec(),
        }
    }
}

impl DetectorConfig {
    /// Derive detector settings from the application config, applying the
    /// pattern file referenced by `PATTERNS_CONFIG_PATH` when present.
    pub fn from_app(cfg: &common::Config) -> Result<Self> {
        let mut out = DetectorConfig {
            tolerance: cfg.pattern_tolerance,
            min_confidence: cfg.min_confidence,
            swing_window: cfg.swing_window,
            ..Default::default()
        };
        if let Some(path) = &cfg.patterns_config_path {
            let file = PatternFileConfig::load(path)?;
            file.apply(&mut out)?;
        }
        Ok(out)
    }
}

/// Optional pattern file (TOML):
///
/// ```toml
/// enabled = ["head_and_shoulders", "double", "triple"]
/// tolerance = 0.03
/// min_confidence = 0.75
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PatternFileConfig {
    #[serde(default)]
    pub enabled: Option<Vec<String>>,
    pub tolerance: Option<f64>,
    pub min_confidence: Option<f64>,
    pub spike_threshold: Option<f64>,
}

impl PatternFileConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read pattern file '{path}': {e}")))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse pattern file '{path}': {e}")))
    }

    fn apply(&self, cfg: &mut DetectorConfig) -> Result<()> {
        if let Some(names) = &self.enabled {
            let mut families = Vec::with_capacity(names.len());
            for name in names {
                let family = PatternFamily::parse(name)
                    .ok_or_else(|| Error::Config(format!("unknown pattern family '{name}'")))?;
                if !families.contains(&family) {
                    families.push(family);
                }
            }
            if families.is_empty() {
                return Err(Error::Config("pattern file enables no families".into()));
            }
            cfg.enabled = families;
        }
        if let Some(t) = self.tolerance {
            cfg.tolerance = t;
        }
        if let Some(c) = self.min_confidence {
            cfg.min_confidence = c;
        }
        if let Some(s) = self.spike_threshold {
            cfg.spike_threshold = s;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_file_overrides_apply() {
        let file: PatternFileConfig = toml::from_str(
            r#"
            enabled = ["double", "spike"]
            tolerance = 0.03
            "#,
        )
        .unwrap();
        let mut cfg = DetectorConfig::default();
        file.apply(&mut cfg).unwrap();
        assert_eq!(cfg.enabled, vec![PatternFamily::DoubleTopBottom, PatternFamily::Spike]);
        assert_eq!(cfg.tolerance, 0.03);
        assert_eq!(cfg.min_confidence, 0.7);
    }

    #[test]
    fn unknown_family_is_a_config_error() {
        let file: PatternFileConfig = toml::from_str(r#"enabled = ["wedge"]"#).unwrap();
        let mut cfg = DetectorConfig::default();
        assert!(file.apply(&mut cfg).is_err());
    }
}
