use std::cmp::Ordering;

use tracing::debug;

use common::{PatternMatch, Series};

use crate::config::DetectorConfig;
use crate::extrema::{default_window, extract};

/// Run the whole catalogue over one series.
///
/// Pure and stateless: identical input yields an identical ordered result.
/// A series too short for extraction yields no matches rather than an
/// error; the scheduler decides whether that is worth logging.
pub fn scan(series: &Series, cfg: &DetectorConfig) -> Vec<PatternMatch> {
    if series.len() < cfg.min_series_len {
        debug!(
            symbol = %series.symbol,
            timeframe = %series.timeframe,
            len = series.len(),
            "series below minimum length, skipping detection"
        );
        return Vec::new();
    }

    let window = cfg.swing_window.unwrap_or_else(|| default_window(series.len()));
    let swings = match extract(series, window) {
        Ok(s) => s,
        Err(e) => {
            debug!(symbol = %series.symbol, error = %e, "extraction skipped");
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for family in &cfg.enabled {
        let width = family.min_points();
        if swings.len() < width {
            continue;
        }
        for w in swings.windows(width) {
            if let Some(m) = family.detect(w, series, cfg) {
                candidates.push(m);
            }
        }
    }

    resolve_overlaps(candidates)
}

/// Overlap policy: when two matches share series indices and point the same
/// direction, only the higher-confidence one survives; confidence ties fall
/// to the family with more structural points. Survivors are ordered by span
/// end ascending. Keeps one price swing from collecting several competing
/// labels.
fn resolve_overlaps(mut candidates: Vec<PatternMatch>) -> Vec<PatternMatch> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.pattern_type
                    .structural_rank()
                    .cmp(&a.pattern_type.structural_rank())
            })
            .then_with(|| a.span.start.cmp(&b.span.start))
            .then_with(|| a.span.end.cmp(&b.span.end))
    });

    let mut accepted: Vec<PatternMatch> = Vec::new();
    for candidate in candidates {
        let shadowed = accepted
            .iter()
            .any(|kept| kept.direction == candidate.direction && kept.span.overlaps(&candidate.span));
        if !shadowed {
            accepted.push(candidate);
        }
    }

    accepted.sort_by(|a, b| {
        a.span
            .end
            .cmp(&b.span.end)
            .then_with(|| a.span.start.cmp(&b.span.start))
    });
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{Candle, PatternType};

    use crate::matchers::PatternFamily;

    fn flat_series(prices: &[f64]) -> Series {
        let candles = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle {
                timestamp: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
                open: p,
                high: p,
                low: p,
                close: p,
            })
            .collect();
        Series::new("TESTUSDT", "1h", candles)
    }

    /// Three near-equal peaks with deep valleys: a triple top whose
    /// sub-windows are also valid double tops.
    fn triple_top_series() -> Series {
        flat_series(&[
            90.0, 95.0, 100.0, 95.0, 90.0, 85.0, 90.0, 95.0, 100.5, 95.0, 90.0, 92.0, 94.0, 96.0,
            98.0, 100.0, 99.0, 98.0, 97.0, 96.0,
        ])
    }

    fn cfg(enabled: Vec<PatternFamily>) -> DetectorConfig {
        DetectorConfig {
            swing_window: Some(2),
            min_series_len: 10,
            enabled,
            ..Default::default()
        }
    }

    #[test]
    fn stronger_family_shadows_overlapping_doubles() {
        let series = triple_top_series();
        let matches = scan(
            &series,
            &cfg(vec![PatternFamily::DoubleTopBottom, PatternFamily::TripleTopBottom]),
        );
        assert_eq!(matches.len(), 1, "got {matches:?}");
        assert_eq!(matches[0].pattern_type, PatternType::TripleTop);
    }

    #[test]
    fn non_overlapping_directions_coexist() {
        // the bearish triple top and the bullish spike off the 85 low both survive
        let series = triple_top_series();
        let matches = scan(&series, &cfg(PatternFamily::ALL.to_vec()));
        assert!(matches
            .iter()
            .any(|m| m.pattern_type == PatternType::TripleTop));
        assert!(matches.iter().any(|m| m.pattern_type == PatternType::SpikeV));
    }

    #[test]
    fn results_are_ordered_by_span_end() {
        let series = triple_top_series();
        let matches = scan(&series, &cfg(PatternFamily::ALL.to_vec()));
        for w in matches.windows(2) {
            assert!(w[0].span.end <= w[1].span.end);
        }
    }

    #[test]
    fn scanning_twice_is_idempotent() {
        let series = triple_top_series();
        let c = cfg(PatternFamily::ALL.to_vec());
        assert_eq!(scan(&series, &c), scan(&series, &c));
    }

    #[test]
    fn short_series_yields_no_matches() {
        let series = flat_series(&[100.0, 90.0, 110.0, 91.0, 100.0]);
        assert!(scan(&series, &cfg(PatternFamily::ALL.to_vec())).is_empty());
    }

    #[test]
    fn series_below_extraction_window_yields_no_matches() {
        let series = flat_series(&[100.0; 12]);
        let c = DetectorConfig {
            swing_window: Some(10),
            min_series_len: 10,
            ..Default::default()
        };
        assert!(scan(&series, &c).is_empty());
    }
}
