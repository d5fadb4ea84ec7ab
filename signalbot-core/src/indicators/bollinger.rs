//! Bollinger Bands: moving average +/- two standard deviations.
//!
//! - Middle: SMA(close, period)
//! - Upper/Lower: middle ± 2 * stddev of the last `period` closes about the mean
//!
//! Uses population stddev (divide by N). Short windows use whatever trailing
//! values exist, around the SMA fallback.

use super::sma::sma;

pub const BAND_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Bands over the last `period` closes.
pub fn bollinger(data: &[f64], period: usize) -> BollingerBands {
    let middle = sma(data, period);
    let take = period.min(data.len());
    let window = &data[data.len() - take..];

    let stddev = if window.is_empty() {
        0.0
    } else {
        let variance = window
            .iter()
            .map(|x| {
                let diff = x - middle;
                diff * diff
            })
            .sum::<f64>()
            / window.len() as f64;
        variance.sqrt()
    };

    let band = BAND_MULTIPLIER * stddev;
    BollingerBands {
        upper: middle + band,
        middle,
        lower: middle - band,
    }
}
