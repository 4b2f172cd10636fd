use std::collections::BTreeMap;

use common::{Direction, PatternMatch, PatternType, Series, Span};

use crate::config::DetectorConfig;
use crate::extrema::{SwingKind, SwingPoint};

use super::{build_match, rel_diff, rel_move};

/// Double Top (bearish) / Double Bottom (bullish).
///
/// Two same-kind extrema within tolerance of each other, separated by an
/// opposite-kind extremum that deviates from the pair by at least twice the
/// tolerance.
pub(super) fn detect(
    window: &[SwingPoint],
    series: &Series,
    cfg: &DetectorConfig,
) -> Option<PatternMatch> {
    let &[first, mid, second] = window else {
        return None;
    };

    let level_gap = rel_diff(first.price, second.price);
    if level_gap > cfg.tolerance {
        return None;
    }

    let pair_avg = (first.price + second.price) / 2.0;
    let (pattern_type, direction, separation, key_levels) = match first.kind {
        SwingKind::Peak => {
            let depth = -rel_move(mid.price, pair_avg);
            let levels = BTreeMap::from([
                ("peak1".to_string(), first.price),
                ("peak2".to_string(), second.price),
                ("support".to_string(), mid.price),
            ]);
            (PatternType::DoubleTop, Direction::Bearish, depth, levels)
        }
        SwingKind::Trough => {
            let height = rel_move(mid.price, pair_avg);
            let levels = BTreeMap::from([
                ("bottom1".to_string(), first.price),
                ("bottom2".to_string(), second.price),
                ("resistance".to_string(), mid.price),
            ]);
            (PatternType::DoubleBottom, Direction::Bullish, height, levels)
        }
    };

    // the separating extremum must be significant, not noise
    if separation < 2.0 * cfg.tolerance {
        return None;
    }

    let confidence = score(cfg, level_gap, separation);

    build_match(
        series,
        cfg,
        pattern_type,
        direction,
        confidence,
        key_levels,
        Span::new(first.index, second.index),
    )
}

/// 0.75 base, +0.1 for a tighter level match, +0.1 for a deeper separating
/// extremum, capped at 0.95.
fn score(cfg: &DetectorConfig, level_gap: f64, separation: f64) -> f64 {
    let mut confidence: f64 = 0.75;
    if level_gap <= cfg.tolerance / 2.0 {
        confidence += 0.1;
    }
    if separation >= 4.0 * cfg.tolerance {
        confidence += 0.1;
    }
    confidence.min(0.95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::testutil::{flat_series, swings};

    fn cfg() -> DetectorConfig {
        DetectorConfig {
            tolerance: 0.02,
            ..Default::default()
        }
    }

    #[test]
    fn double_top_within_tolerance_is_bearish() {
        let series = flat_series(&[100.0, 85.0, 100.5]);
        let window = swings(SwingKind::Peak, &[(0, 100.0), (1, 85.0), (2, 100.5)]);
        let m = detect(&window, &series, &cfg()).expect("pattern expected");
        assert_eq!(m.pattern_type, PatternType::DoubleTop);
        assert_eq!(m.direction, Direction::Bearish);
        // 0.5% level gap and a deep valley: both bonuses apply
        assert!(m.confidence > 0.75, "confidence {}", m.confidence);
        assert_eq!(m.key_levels["support"], 85.0);
    }

    #[test]
    fn double_bottom_is_bullish() {
        let series = flat_series(&[85.0, 92.0, 85.3]);
        let window = swings(SwingKind::Trough, &[(0, 85.0), (1, 92.0), (2, 85.3)]);
        let m = detect(&window, &series, &cfg()).expect("pattern expected");
        assert_eq!(m.pattern_type, PatternType::DoubleBottom);
        assert_eq!(m.direction, Direction::Bullish);
        assert_eq!(m.key_levels["resistance"], 92.0);
    }

    #[test]
    fn peaks_outside_tolerance_are_rejected() {
        let series = flat_series(&[100.0, 85.0, 105.0]);
        let window = swings(SwingKind::Peak, &[(0, 100.0), (1, 85.0), (2, 105.0)]);
        assert!(detect(&window, &series, &cfg()).is_none());
    }

    #[test]
    fn shallow_valley_is_rejected() {
        // valley only 1% below the pair: below the 2x tolerance threshold
        let series = flat_series(&[100.0, 99.0, 100.0]);
        let window = swings(SwingKind::Peak, &[(0, 100.0), (1, 99.0), (2, 100.0)]);
        assert!(detect(&window, &series, &cfg()).is_none());
    }
}
