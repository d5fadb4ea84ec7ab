//! Feature extraction: candle window → fixed-length normalized vector.
//!
//! Every ratio divides by the current price or by the reference value it is
//! measured against (an average, a previous close, a previous volume). A
//! denominator of exactly zero is a data-quality failure and is reported as
//! [`FeatureError::ZeroDenominator`] instead of leaking NaN/inf downstream.

use crate::domain::{closes, Candle};
use crate::indicators::{bollinger, ema, macd, rsi, sma, BOLLINGER_PERIOD, RSI_PERIOD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of every feature vector.
pub const FEATURE_COUNT: usize = 20;

/// Minimum window length for a valid feature vector.
pub const MIN_CANDLES: usize = 50;

/// Feature names, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "price_vs_sma20",
    "price_vs_sma50",
    "ema12_minus_ema26",
    "rsi_deviation",
    "macd",
    "macd_histogram",
    "bollinger_upper_distance",
    "bollinger_lower_distance",
    "bollinger_width",
    "volume_vs_avg20",
    "momentum_1",
    "momentum_5",
    "momentum_10",
    "volatility_10",
    "sma20_vs_sma50",
    "support_distance",
    "resistance_distance",
    "volume_change",
    "macd_signal",
    "rsi_momentum",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureError {
    #[error("need at least {needed} candles, got {got}")]
    InsufficientCandles { needed: usize, got: usize },

    #[error("zero denominator while computing '{feature}'")]
    ZeroDenominator { feature: &'static str },

    #[error("non-finite value for '{feature}'")]
    NonFinite { feature: &'static str },
}

/// Fixed-length normalized features for one analysis tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }
}

fn ratio(numerator: f64, denominator: f64, feature: &'static str) -> Result<f64, FeatureError> {
    if denominator == 0.0 {
        return Err(FeatureError::ZeroDenominator { feature });
    }
    Ok(numerator / denominator)
}

/// Root-mean-square of bar-to-bar returns over the last `bars` returns.
fn realized_volatility(closes: &[f64], bars: usize) -> Result<f64, FeatureError> {
    let window = &closes[closes.len() - bars - 1..];
    let mut sum_sq = 0.0;
    for w in window.windows(2) {
        let r = ratio(w[1] - w[0], w[0], "volatility_10")?;
        sum_sq += r * r;
    }
    Ok((sum_sq / bars as f64).sqrt())
}

/// Build the feature vector for the last candle of `candles`.
pub fn extract(candles: &[Candle]) -> Result<FeatureVector, FeatureError> {
    if candles.len() < MIN_CANDLES {
        return Err(FeatureError::InsufficientCandles {
            needed: MIN_CANDLES,
            got: candles.len(),
        });
    }

    let closes = closes(candles);
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let n = closes.len();
    let price = closes[n - 1];
    let volume = volumes[n - 1];

    let sma20 = sma(&closes, 20);
    let sma50 = sma(&closes, 50);
    let rsi_now = rsi(&closes, RSI_PERIOD);
    let rsi_prev = rsi(&closes[..n - 1], RSI_PERIOD);
    let m = macd(&closes);
    let bb = bollinger(&closes, BOLLINGER_PERIOD);
    let avg_volume = sma(&volumes, 20);

    let recent = &candles[n - 20..];
    let support = recent.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let resistance = recent
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);

    let values = [
        ratio(price - sma20, sma20, FEATURE_NAMES[0])?,
        ratio(price - sma50, sma50, FEATURE_NAMES[1])?,
        ratio(ema(&closes, 12) - ema(&closes, 26), price, FEATURE_NAMES[2])?,
        (rsi_now - 50.0) / 50.0,
        ratio(m.macd, price, FEATURE_NAMES[4])?,
        ratio(m.histogram, price, FEATURE_NAMES[5])?,
        ratio(price - bb.upper, price, FEATURE_NAMES[6])?,
        ratio(price - bb.lower, price, FEATURE_NAMES[7])?,
        ratio(bb.width(), price, FEATURE_NAMES[8])?,
        ratio(volume - avg_volume, avg_volume, FEATURE_NAMES[9])?,
        ratio(price - closes[n - 2], closes[n - 2], FEATURE_NAMES[10])?,
        ratio(price - closes[n - 6], closes[n - 6], FEATURE_NAMES[11])?,
        ratio(price - closes[n - 11], closes[n - 11], FEATURE_NAMES[12])?,
        realized_volatility(&closes, 10)?,
        ratio(sma20 - sma50, sma50, FEATURE_NAMES[14])?,
        ratio(price - support, price, FEATURE_NAMES[15])?,
        ratio(resistance - price, price, FEATURE_NAMES[16])?,
        ratio(volume - volumes[n - 2], volumes[n - 2], FEATURE_NAMES[17])?,
        ratio(m.signal, price, FEATURE_NAMES[18])?,
        (rsi_now - rsi_prev) / 100.0,
    ];

    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(FeatureError::NonFinite {
            feature: FEATURE_NAMES[i],
        });
    }

    Ok(FeatureVector(values))
}
