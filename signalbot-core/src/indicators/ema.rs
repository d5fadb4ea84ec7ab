//! Exponential Moving Average (EMA).

use super::last_or_zero;

/// EMA at the last element.
///
/// Seed: SMA of the first `period` values, then forward through the rest with
/// ema = (x - ema) * k + ema, k = 2 / (period + 1).
/// Falls back to the last value when the window is shorter than `period`.
pub fn ema(data: &[f64], period: usize) -> f64 {
    if period == 0 || data.len() < period {
        return last_or_zero(data);
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = data[..period].iter().sum::<f64>() / period as f64;

    data[period..]
        .iter()
        .fold(seed, |prev, &x| (x - prev) * multiplier + prev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_3_known_values() {
        // k = 0.5, seed = mean(10,11,12) = 11
        // 13 → 12, 14 → 13
        let data = [10.0, 11.0, 12.0, 13.0, 14.0];
        assert_approx(ema(&data, 3), 13.0, DEFAULT_EPSILON);
        assert_approx(ema(&data[..3], 3), 11.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_period_1_is_last() {
        assert_approx(ema(&[100.0, 200.0, 300.0], 1), 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn single_value_falls_back() {
        assert_approx(ema(&[0.0042], 9), 0.0042, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_series_is_constant() {
        let data = vec![1.25; 40];
        assert_approx(ema(&data, 12), 1.25, DEFAULT_EPSILON);
    }
}
