pub mod double;
pub mod head_shoulders;
pub mod rounding;
pub mod spike;
pub mod triple;

use std::collections::BTreeMap;

use common::{Direction, PatternMatch, PatternType, Series, Span};

use crate::config::DetectorConfig;
use crate::extrema::SwingPoint;

/// The closed catalogue of matcher families. The set is fixed and finite,
/// so dispatch is a plain `match` rather than trait objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFamily {
    HeadAndShoulders,
    DoubleTopBottom,
    TripleTopBottom,
    RoundingBottom,
    Spike,
}

impl PatternFamily {
    pub const ALL: [PatternFamily; 5] = [
        PatternFamily::HeadAndShoulders,
        PatternFamily::DoubleTopBottom,
        PatternFamily::TripleTopBottom,
        PatternFamily::RoundingBottom,
        PatternFamily::Spike,
    ];

    /// Number of swing points one detection window needs.
    pub fn min_points(&self) -> usize {
        match self {
            PatternFamily::HeadAndShoulders => 5,
            PatternFamily::DoubleTopBottom => 3,
            PatternFamily::TripleTopBottom => 5,
            PatternFamily::RoundingBottom => 8,
            PatternFamily::Spike => 3,
        }
    }

    /// Run this family's matcher over one window of swing points.
    /// Returns at most one match, never one below `cfg.min_confidence`.
    pub fn detect(
        &self,
        window: &[SwingPoint],
        series: &Series,
        cfg: &DetectorConfig,
    ) -> Option<PatternMatch> {
        debug_assert_eq!(window.len(), self.min_points());
        match self {
            PatternFamily::HeadAndShoulders => head_shoulders::detect(window, series, cfg),
            PatternFamily::DoubleTopBottom => double::detect(window, series, cfg),
            PatternFamily::TripleTopBottom => triple::detect(window, series, cfg),
            PatternFamily::RoundingBottom => rounding::detect(window, series, cfg),
            PatternFamily::Spike => spike::detect(window, series, cfg),
        }
    }

    /// Identifier used in the pattern file.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "head_and_shoulders" => Some(PatternFamily::HeadAndShoulders),
            "double" => Some(PatternFamily::DoubleTopBottom),
            "triple" => Some(PatternFamily::TripleTopBottom),
            "rounding_bottom" => Some(PatternFamily::RoundingBottom),
            "spike" => Some(PatternFamily::Spike),
            _ => None,
        }
    }
}

/// Finish a candidate: clamp the score, drop sub-threshold matches, stamp
/// `detected_at` from the candle at the span end.
pub(crate) fn build_match(
    series: &Series,
    cfg: &DetectorConfig,
    pattern_type: PatternType,
    direction: Direction,
    confidence: f64,
    key_levels: BTreeMap<String, f64>,
    span: Span,
) -> Option<PatternMatch> {
    let confidence = confidence.clamp(0.0, 1.0);
    if confidence < cfg.min_confidence {
        return None;
    }
    let detected_at = series.candles.get(span.end)?.timestamp;
    Some(PatternMatch {
        pattern_type,
        direction,
        confidence,
        key_levels,
        span,
        detected_at,
    })
}

/// Relative difference |a - b| / |a|, guarded against zero prices.
pub(crate) fn rel_diff(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(f64::EPSILON)
}

/// Signed relative excursion of `value` from `base`.
pub(crate) fn rel_move(value: f64, base: f64) -> f64 {
    (value - base) / base.abs().max(f64::EPSILON)
}
