//! Relative Strength Index (RSI).
//!
//! Simple (non-Wilder) averages of gains and losses.

/// RSI over the last `period` price changes.
///
/// avg_gain = sum(gains) / period, avg_loss = sum(losses) / period,
/// RSI = 100 - 100 / (1 + avg_gain / avg_loss).
/// Edge cases: avg_loss == 0 → 100 (including a perfectly flat window);
/// fewer than period + 1 values → 50.
pub fn rsi(data: &[f64], period: usize) -> f64 {
    if period == 0 || data.len() < period + 1 {
        return 50.0;
    }

    let window = &data[data.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}
