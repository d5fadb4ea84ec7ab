//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)

use crate::domain::Candle;

/// True range of `bar` given the previous bar's close.
pub fn true_range(bar: &Candle, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

/// Simple mean of the last `period` true ranges (no Wilder smoothing).
///
/// Needs period + 1 candles so every averaged bar has a previous close;
/// returns 0.0 otherwise.
pub fn atr(candles: &[Candle], period: usize) -> f64 {
    if period == 0 || candles.len() < period + 1 {
        return 0.0;
    }

    let window = &candles[candles.len() - period - 1..];
    let sum: f64 = window
        .windows(2)
        .map(|w| true_range(&w[1], w[0].close))
        .sum();
    sum / period as f64
}
