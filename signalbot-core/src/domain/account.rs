//! AccountInfo: account state derived from realized balance + open positions.

use super::position::Position;
use serde::{Deserialize, Serialize};

/// Account snapshot.
///
/// Never mutated independently: every field follows from the realized
/// balance and the open-position set.
/// `equity == balance + profit`, `free_margin == equity - margin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
    pub free_margin: f64,
    pub profit: f64,
    pub leverage: f64,
}

impl AccountInfo {
    pub fn derive(balance: f64, leverage: f64, positions: &[Position]) -> Self {
        let profit: f64 = positions.iter().map(|p| p.profit).sum();
        let margin: f64 = positions.iter().map(|p| p.margin(leverage)).sum();
        let equity = balance + profit;
        Self {
            balance,
            equity,
            margin,
            free_margin: equity - margin,
            profit,
            leverage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Side, Ticket};
    use chrono::Utc;

    #[test]
    fn empty_book_is_all_balance() {
        let info = AccountInfo::derive(10_000.0, 100.0, &[]);
        assert_eq!(info.equity, 10_000.0);
        assert_eq!(info.margin, 0.0);
        assert_eq!(info.free_margin, 10_000.0);
    }

    #[test]
    fn identity_holds_with_positions() {
        let mut pos = Position {
            ticket: Ticket(7),
            symbol: "EURUSD".into(),
            side: Side::Buy,
            volume: 0.02,
            open_price: 1.2,
            current_price: 1.2,
            profit: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            open_time: Utc::now(),
        };
        pos.mark(1.21);
        let info = AccountInfo::derive(5_000.0, 100.0, &[pos]);
        assert!((info.profit - 20.0).abs() < 1e-9);
        assert!((info.equity - 5_020.0).abs() < 1e-9);
        assert!((info.margin - 24.0).abs() < 1e-9);
        assert!((info.free_margin - (info.equity - info.margin)).abs() < 1e-12);
    }
}
