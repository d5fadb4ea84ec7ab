//! Simple Moving Average (SMA).

use super::last_or_zero;

/// Mean of the last `period` values.
///
/// With fewer than `period` values (or period 0) this is the last value
/// itself, not an average of what is available; 0.0 for an empty slice.
pub fn sma(data: &[f64], period: usize) -> f64 {
    if period == 0 || data.len() < period {
        return last_or_zero(data);
    }
    let window = &data[data.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_uses_trailing_window() {
        let data = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0];
        // mean(12..=16) = 14
        assert_approx(sma(&data, 5), 14.0, DEFAULT_EPSILON);
        assert_approx(sma(&data, 1), 16.0, DEFAULT_EPSILON);
        assert_approx(sma(&data, 7), 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn short_window_falls_back_to_last() {
        // Not mean(10, 20) = 15
        assert_approx(sma(&[10.0, 20.0], 5), 20.0, DEFAULT_EPSILON);
    }

    #[test]
    fn empty_window_is_zero() {
        assert_eq!(sma(&[], 3), 0.0);
    }
}
