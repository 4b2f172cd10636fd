use std::collections::BTreeMap;

use common::{Direction, PatternMatch, PatternType, Series, Span};

use crate::config::DetectorConfig;
use crate::extrema::{SwingKind, SwingPoint};

use super::build_match;

/// Relative slope-magnitude asymmetry beyond which a candidate is no longer
/// a rounded bottom. Calibrated to the legacy detector.
const SYMMETRY_LIMIT: f64 = 0.5;

/// Rounding Bottom (bullish).
///
/// Fits the trough run inside the window: the first half must descend into
/// the bottom, the second half ascend out of it, with comparable slope
/// magnitudes. An eight-point alternating window always contains four
/// troughs.
pub(super) fn detect(
    window: &[SwingPoint],
    series: &Series,
    cfg: &DetectorConfig,
) -> Option<PatternMatch> {
    let troughs: Vec<(f64, f64)> = window
        .iter()
        .filter(|p| p.kind == SwingKind::Trough)
        .map(|p| (p.index as f64, p.price))
        .collect();
    if troughs.len() < 4 {
        return None;
    }

    let mean_price = troughs.iter().map(|&(_, p)| p).sum::<f64>() / troughs.len() as f64;
    if mean_price <= 0.0 {
        return None;
    }

    let mid = troughs.len() / 2;
    let left_slope = slope(&troughs[..mid]) / mean_price;
    let right_slope = slope(&troughs[mid..]) / mean_price;

    // descending into the bottom, ascending out of it
    if left_slope >= 0.0 || right_slope <= 0.0 {
        return None;
    }

    let (l, r) = (left_slope.abs(), right_slope.abs());
    let asymmetry = (l - r).abs() / l.max(r).max(f64::EPSILON);
    if asymmetry > SYMMETRY_LIMIT {
        return None;
    }

    let confidence = score(asymmetry);

    let bottom = troughs.iter().map(|&(_, p)| p).fold(f64::INFINITY, f64::min);
    let key_levels = BTreeMap::from([
        ("bottom".to_string(), bottom),
        ("entry".to_string(), troughs[0].1),
        ("current".to_string(), troughs[troughs.len() - 1].1),
    ]);

    build_match(
        series,
        cfg,
        PatternType::RoundingBottom,
        Direction::Bullish,
        confidence,
        key_levels,
        Span::new(window[0].index, window[window.len() - 1].index),
    )
}

/// Scales from 0.85 at perfect symmetry down to 0.65 at the limit.
fn score(asymmetry: f64) -> f64 {
    0.65 + 0.2 * (1.0 - asymmetry / SYMMETRY_LIMIT)
}

/// Least-squares slope of (index, price) points.
fn slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    let sx: f64 = points.iter().map(|&(x, _)| x).sum();
    let sy: f64 = points.iter().map(|&(_, y)| y).sum();
    let sxx: f64 = points.iter().map(|&(x, _)| x * x).sum();
    let sxy: f64 = points.iter().map(|&(x, y)| x * y).sum();
    let denom = n * sxx - sx * sx;
    if denom.abs() < f64::EPSILON {
        0.0
    } else {
        (n * sxy - sx * sy) / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::testutil::{flat_series, swings};

    fn cfg() -> DetectorConfig {
        DetectorConfig {
            min_confidence: 0.6,
            ..Default::default()
        }
    }

    fn u_shaped_window() -> Vec<SwingPoint> {
        // troughs at 96, 90, 90, 96: symmetric U
        swings(
            SwingKind::Trough,
            &[
                (0, 96.0),
                (2, 99.0),
                (4, 90.0),
                (6, 93.0),
                (8, 90.0),
                (10, 95.0),
                (12, 96.0),
                (14, 99.0),
            ],
        )
    }

    #[test]
    fn symmetric_u_shape_matches() {
        let series = flat_series(&[96.0; 15]);
        let m = detect(&u_shaped_window(), &series, &cfg()).expect("pattern expected");
        assert_eq!(m.pattern_type, PatternType::RoundingBottom);
        assert_eq!(m.direction, Direction::Bullish);
        assert!((0.65..=0.85).contains(&m.confidence), "confidence {}", m.confidence);
        assert_eq!(m.key_levels["bottom"], 90.0);
    }

    #[test]
    fn monotonic_descent_is_rejected() {
        let series = flat_series(&[100.0; 15]);
        let window = swings(
            SwingKind::Trough,
            &[
                (0, 100.0),
                (2, 102.0),
                (4, 96.0),
                (6, 98.0),
                (8, 92.0),
                (10, 94.0),
                (12, 88.0),
                (14, 90.0),
            ],
        );
        assert!(detect(&window, &series, &cfg()).is_none());
    }

    #[test]
    fn lopsided_slopes_are_rejected() {
        let series = flat_series(&[100.0; 15]);
        // gentle descent, violent recovery: asymmetry beyond the limit
        let window = swings(
            SwingKind::Trough,
            &[
                (0, 91.0),
                (2, 95.0),
                (4, 90.0),
                (6, 94.0),
                (8, 90.5),
                (10, 99.0),
                (12, 104.0),
                (14, 108.0),
            ],
        );
        assert!(detect(&window, &series, &cfg()).is_none());
    }

    #[test]
    fn perfect_symmetry_scores_the_ceiling() {
        assert!((score(0.0) - 0.85).abs() < 1e-12);
        assert!((score(SYMMETRY_LIMIT) - 0.65).abs() < 1e-12);
    }
}
