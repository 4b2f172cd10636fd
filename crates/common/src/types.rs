use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLC candle as returned by the market data client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Ordered candle sequence for one (symbol, timeframe), oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub symbol: String,
    pub timeframe: String,
    pub candles: Vec<Candle>,
}

impl Series {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    /// Sanity check on fetched data: non-empty, `high >= close/open >= low`,
    /// finite prices, timestamps strictly ascending.
    pub fn is_well_formed(&self) -> bool {
        if self.candles.is_empty() {
            return false;
        }
        for c in &self.candles {
            let finite =
                c.open.is_finite() && c.high.is_finite() && c.low.is_finite() && c.close.is_finite();
            if !finite || c.high < c.low || c.high < c.close || c.low > c.close {
                return false;
            }
        }
        self.candles
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    }
}

/// The fixed catalogue of reversal formations the detector recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    HeadAndShoulders,
    InverseHeadAndShoulders,
    DoubleTop,
    DoubleBottom,
    TripleTop,
    TripleBottom,
    RoundingBottom,
    SpikeV,
}

impl PatternType {
    /// Number-of-structural-points precedence used when two overlapping
    /// matches tie on confidence: Triple > H&S > Double > Rounding/Spike.
    pub fn structural_rank(&self) -> u8 {
        match self {
            PatternType::TripleTop | PatternType::TripleBottom => 3,
            PatternType::HeadAndShoulders | PatternType::InverseHeadAndShoulders => 2,
            PatternType::DoubleTop | PatternType::DoubleBottom => 1,
            PatternType::RoundingBottom | PatternType::SpikeV => 0,
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PatternType::HeadAndShoulders => "Head and Shoulders",
            PatternType::InverseHeadAndShoulders => "Inverse Head and Shoulders",
            PatternType::DoubleTop => "Double Top",
            PatternType::DoubleBottom => "Double Bottom",
            PatternType::TripleTop => "Triple Top",
            PatternType::TripleBottom => "Triple Bottom",
            PatternType::RoundingBottom => "Rounding Bottom",
            PatternType::SpikeV => "Spike V",
        };
        write!(f, "{name}")
    }
}

/// Expected direction of the reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Bullish => write!(f, "BULLISH"),
            Direction::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// Inclusive index range a match covers in its source series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A scored formation found in a series. Read-only after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_type: PatternType,
    pub direction: Direction,
    /// Heuristic reliability score in [0, 1]; not a probability.
    pub confidence: f64,
    /// Named price levels, e.g. "neckline" or "left_shoulder".
    pub key_levels: BTreeMap<String, f64>,
    pub span: Span,
    /// Timestamp of the candle at `span.end`, so detection stays deterministic.
    pub detected_at: DateTime<Utc>,
}
