use std::collections::BTreeMap;

use common::{Direction, PatternMatch, PatternType, Series, Span};

use crate::config::DetectorConfig;
use crate::extrema::{SwingKind, SwingPoint};

use super::{build_match, rel_diff, rel_move};

/// Triple Top (bearish) / Triple Bottom (bullish).
///
/// Three same-kind extrema within tolerance of their average, separated by
/// two opposite-kind extrema that each deviate by at least twice the
/// tolerance. Three-point confirmation carries the highest base score in
/// the catalogue.
pub(super) fn detect(
    window: &[SwingPoint],
    series: &Series,
    cfg: &DetectorConfig,
) -> Option<PatternMatch> {
    let &[x1, s1, x2, s2, x3] = window else {
        return None;
    };

    let levels = [x1.price, x2.price, x3.price];
    let avg = levels.iter().sum::<f64>() / 3.0;
    let max_deviation = levels
        .iter()
        .map(|&l| rel_diff(avg, l))
        .fold(0.0, f64::max);
    if max_deviation > cfg.tolerance {
        return None;
    }

    let (pattern_type, direction, separations, key_levels) = match x1.kind {
        SwingKind::Peak => {
            let seps = [-rel_move(s1.price, avg), -rel_move(s2.price, avg)];
            let levels = BTreeMap::from([
                ("peak1".to_string(), x1.price),
                ("peak2".to_string(), x2.price),
                ("peak3".to_string(), x3.price),
                ("support".to_string(), s1.price.min(s2.price)),
            ]);
            (PatternType::TripleTop, Direction::Bearish, seps, levels)
        }
        SwingKind::Trough => {
            let seps = [rel_move(s1.price, avg), rel_move(s2.price, avg)];
            let levels = BTreeMap::from([
                ("bottom1".to_string(), x1.price),
                ("bottom2".to_string(), x2.price),
                ("bottom3".to_string(), x3.price),
                ("resistance".to_string(), s1.price.max(s2.price)),
            ]);
            (PatternType::TripleBottom, Direction::Bullish, seps, levels)
        }
    };

    if separations.iter().any(|&s| s < 2.0 * cfg.tolerance) {
        return None;
    }

    let confidence = score(cfg, max_deviation);

    build_match(
        series,
        cfg,
        pattern_type,
        direction,
        confidence,
        key_levels,
        Span::new(x1.index, x3.index),
    )
}

/// 0.85 base, +0.1 when all three levels sit within half the tolerance,
/// capped at 0.95.
fn score(cfg: &DetectorConfig, max_deviation: f64) -> f64 {
    let mut confidence: f64 = 0.85;
    if max_deviation <= cfg.tolerance / 2.0 {
        confidence += 0.1;
    }
    confidence.min(0.95)
}
