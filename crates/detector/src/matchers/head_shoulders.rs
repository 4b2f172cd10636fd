use std::collections::BTreeMap;

use common::{Direction, PatternMatch, PatternType, Series, Span};

use crate::config::DetectorConfig;
use crate::extrema::{SwingKind, SwingPoint};

use super::{build_match, rel_diff, rel_move};

/// Head & Shoulders (bearish) and its inverse (bullish).
///
/// Five alternating swing points. The head must exceed both shoulders by
/// more than the tolerance; the shoulders must sit within tolerance of each
/// other. The neckline connects the two intervening troughs (peaks for the
/// inverse).
pub(super) fn detect(
    window: &[SwingPoint],
    series: &Series,
    cfg: &DetectorConfig,
) -> Option<PatternMatch> {
    let &[left, n1, head, n2, right] = window else {
        return None;
    };

    let (pattern_type, direction) = match head.kind {
        SwingKind::Peak => (PatternType::HeadAndShoulders, Direction::Bearish),
        SwingKind::Trough => (PatternType::InverseHeadAndShoulders, Direction::Bullish),
    };

    // head prominence over each shoulder, positive when the structure holds
    let (left_excess, right_excess) = match direction {
        Direction::Bearish => (rel_move(head.price, left.price), rel_move(head.price, right.price)),
        Direction::Bullish => (-rel_move(head.price, left.price), -rel_move(head.price, right.price)),
    };
    if left_excess <= cfg.tolerance || right_excess <= cfg.tolerance {
        return None;
    }

    let shoulder_diff = rel_diff(left.price, right.price);
    if shoulder_diff > cfg.tolerance {
        return None;
    }

    let neckline = (n1.price + n2.price) / 2.0;
    let neckline_gap = rel_diff(n1.price, n2.price);

    let shoulder_avg = (left.price + right.price) / 2.0;
    let prominence = match direction {
        Direction::Bearish => rel_move(head.price, shoulder_avg),
        Direction::Bullish => -rel_move(head.price, shoulder_avg),
    };

    let confidence = score(cfg, shoulder_diff, neckline_gap, prominence);

    let key_levels = BTreeMap::from([
        ("head".to_string(), head.price),
        ("left_shoulder".to_string(), left.price),
        ("right_shoulder".to_string(), right.price),
        ("neckline".to_string(), neckline),
    ]);

    build_match(
        series,
        cfg,
        pattern_type,
        direction,
        confidence,
        key_levels,
        Span::new(left.index, right.index),
    )
}

/// Additive heuristic: 0.7 base, +0.1 for tight shoulder symmetry, +0.1 for
/// a near-flat neckline, +0.1 for strong head prominence, capped at 0.95.
fn score(cfg: &DetectorConfig, shoulder_diff: f64, neckline_gap: f64, prominence: f64) -> f64 {
    let mut confidence: f64 = 0.7;
    if shoulder_diff <= cfg.tolerance / 2.0 {
        confidence += 0.1;
    }
    if neckline_gap <= cfg.tolerance / 2.0 {
        confidence += 0.1;
    }
    if prominence > 2.0 * cfg.tolerance {
        confidence += 0.1;
    }
    confidence.min(0.95)
}
