use common::{Error, Result, Series};

/// Kind of a local extremum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingKind {
    Peak,
    Trough,
}

/// A local price extremum identified over a lookback window.
/// Kinds strictly alternate along the extracted sequence; matchers rely
/// on that invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    /// Position in the source series.
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
}

/// Default lookback radius, proportional to series length.
pub fn default_window(series_len: usize) -> usize {
    (series_len / 20).max(2)
}

/// Convert a raw series into an ordered, strictly alternating sequence of
/// swing points.
///
/// Index `i` is a peak when `high[i]` is the strict maximum of the closed
/// interval `[i - window, i + window]`; troughs are symmetric on `low`.
/// Ties resolve to the earliest index. Pure and deterministic.
pub fn extract(series: &Series, window: usize) -> Result<Vec<SwingPoint>> {
    let n = series.len();
    let required = 2 * window + 1;
    if n < required {
        return Err(Error::InsufficientData {
            required,
            actual: n,
        });
    }

    let mut raw = Vec::new();
    for i in window..n - window {
        let win = &series.candles[i - window..=i + window];

        let max = win.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let high = series.candles[i].high;
        // earliest index wins a tie: no earlier bar in the window may equal the max
        if high == max && win[..window].iter().all(|c| c.high < max) {
            raw.push(SwingPoint {
                index: i,
                price: high,
                kind: SwingKind::Peak,
            });
        }

        let min = win.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let low = series.candles[i].low;
        if low == min && win[..window].iter().all(|c| c.low > min) {
            raw.push(SwingPoint {
                index: i,
                price: low,
                kind: SwingKind::Trough,
            });
        }
    }

    Ok(collapse(raw))
}

/// Enforce strict alternation: consecutive same-kind extrema collapse to the
/// more extreme one (earlier wins a tie).
fn collapse(points: Vec<SwingPoint>) -> Vec<SwingPoint> {
    let mut out: Vec<SwingPoint> = Vec::with_capacity(points.len());
    for p in points {
        match out.last_mut() {
            Some(last) if last.kind == p.kind => {
                let more_extreme = match p.kind {
                    SwingKind::Peak => p.price > last.price,
                    SwingKind::Trough => p.price < last.price,
                };
                if more_extreme {
                    *last = p;
                }
            }
            _ => out.push(p),
        }
    }
    out
}
