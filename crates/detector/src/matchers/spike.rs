use std::collections::BTreeMap;

use common::{Direction, PatternMatch, PatternType, Series, Span};

use crate::config::DetectorConfig;
use crate::extrema::{SwingKind, SwingPoint};

use super::{build_match, rel_move};

/// Spike / V pattern: a sharp excursion followed by a comparably sharp
/// reversal, both legs inside a handful of bars.
pub(super) fn detect(
    window: &[SwingPoint],
    series: &Series,
    cfg: &DetectorConfig,
) -> Option<PatternMatch> {
    let &[prev, spike, next] = window else {
        return None;
    };

    if spike.index - prev.index > cfg.spike_max_span || next.index - spike.index > cfg.spike_max_span
    {
        return None;
    }

    let (direction, drop, recovery, key_levels) = match spike.kind {
        SwingKind::Trough => {
            let drop = -rel_move(spike.price, prev.price);
            let recovery = rel_move(next.price, spike.price);
            let levels = BTreeMap::from([
                ("spike_low".to_string(), spike.price),
                ("entry".to_string(), prev.price),
                ("exit".to_string(), next.price),
            ]);
            (Direction::Bullish, drop, recovery, levels)
        }
        SwingKind::Peak => {
            let rise = rel_move(spike.price, prev.price);
            let fall = -rel_move(next.price, spike.price);
            let levels = BTreeMap::from([
                ("spike_high".to_string(), spike.price),
                ("entry".to_string(), prev.price),
                ("exit".to_string(), next.price),
            ]);
            (Direction::Bearish, rise, fall, levels)
        }
    };

    if drop < cfg.spike_threshold || recovery < cfg.spike_threshold {
        return None;
    }

    let confidence = score(cfg, drop.min(recovery));

    build_match(
        series,
        cfg,
        PatternType::SpikeV,
        direction,
        confidence,
        key_levels,
        Span::new(prev.index, next.index),
    )
}

/// 0.7 base, scaling with how far the weaker leg exceeds the threshold,
/// up to 0.9.
fn score(cfg: &DetectorConfig, weaker_leg: f64) -> f64 {
    let excess = ((weaker_leg - cfg.spike_threshold) / cfg.spike_threshold).clamp(0.0, 1.0);
    0.7 + 0.2 * excess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::testutil::{flat_series, swings};

    fn cfg() -> DetectorConfig {
        DetectorConfig::default()
    }

    #[test]
    fn sharp_v_is_bullish() {
        let series = flat_series(&[100.0, 95.0, 90.0, 85.0, 90.0, 95.0, 100.0]);
        let window = swings(SwingKind::Peak, &[(0, 100.0), (3, 85.0), (6, 100.0)]);
        let m = detect(&window, &series, &cfg()).expect("pattern expected");
        assert_eq!(m.pattern_type, PatternType::SpikeV);
        assert_eq!(m.direction, Direction::Bullish);
        assert_eq!(m.key_levels["spike_low"], 85.0);
        // both legs far beyond the threshold: score at the 0.9 ceiling
        assert!((m.confidence - 0.9).abs() < 1e-9, "confidence {}", m.confidence);
    }

    #[test]
    fn inverted_v_is_bearish() {
        let series = flat_series(&[100.0, 105.0, 110.0, 115.0, 110.0, 105.0, 100.0]);
        let window = swings(SwingKind::Trough, &[(0, 100.0), (3, 115.0), (6, 100.0)]);
        let m = detect(&window, &series, &cfg()).expect("pattern expected");
        assert_eq!(m.direction, Direction::Bearish);
        assert_eq!(m.key_levels["spike_high"], 115.0);
    }

    #[test]
    fn slow_drift_is_rejected() {
        // legs well beyond the allowed bar span
        let series = flat_series(&[100.0; 30]);
        let window = swings(SwingKind::Peak, &[(0, 100.0), (12, 85.0), (24, 100.0)]);
        assert!(detect(&window, &series, &cfg()).is_none());
    }

    #[test]
    fn shallow_move_is_rejected() {
        let series = flat_series(&[100.0, 99.0, 98.0, 99.0, 100.0]);
        let window = swings(SwingKind::Peak, &[(0, 100.0), (2, 98.0), (4, 100.0)]);
        assert!(detect(&window, &series, &cfg()).is_none());
    }

    #[test]
    fn confidence_scales_with_the_weaker_leg() {
        let c = cfg();
        assert!((score(&c, 0.05) - 0.7).abs() < 1e-12);
        assert!((score(&c, 0.075) - 0.8).abs() < 1e-12);
        assert!((score(&c, 0.2) - 0.9).abs() < 1e-12);
    }
}
