//! Indicator library.
//!
//! Pure functions over an ordered window of closing prices (or candles),
//! oldest first. Each returns the indicator value at the *last* element of
//! the window. No state is carried between calls.
//!
//! Short windows never panic: every indicator documents its degenerate
//! fallback (last element, 50, or 0).

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::{atr, true_range};
pub use bollinger::{bollinger, BollingerBands};
pub use ema::ema;
pub use macd::{macd, Macd};
pub use rsi::rsi;
pub use sma::sma;

/// Default RSI lookback.
pub const RSI_PERIOD: usize = 14;
/// Default ATR lookback.
pub const ATR_PERIOD: usize = 14;
/// Default Bollinger lookback.
pub const BOLLINGER_PERIOD: usize = 20;

/// Last element of a window, or 0.0 when the window is empty.
pub(crate) fn last_or_zero(data: &[f64]) -> f64 {
    data.last().copied().unwrap_or(0.0)
}

/// Create synthetic candles from close prices for testing.
///
/// open = prev_close (or close for the first candle),
/// high = max(open,close) + 0.001, low = min(open,close) - 0.001, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<crate::domain::Candle> {
    use crate::domain::Candle;
    use chrono::TimeZone;
    let start = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.001,
                low: open.min(close) - 0.001,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
