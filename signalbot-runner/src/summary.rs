//! Trade history summary and export.

use serde::Serialize;
use signalbot_core::domain::{TradeAction, TradeHistoryRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySummary {
    pub opened: usize,
    pub closed: usize,
    pub wins: usize,
    pub losses: usize,
    pub realized_pnl: f64,
    /// Wins over closes, in [0, 1]; zero with no closes.
    pub win_rate: f64,
}

impl HistorySummary {
    pub fn from_records(records: &[TradeHistoryRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.action {
                TradeAction::Buy | TradeAction::Sell => summary.opened += 1,
                TradeAction::Close => {
                    summary.closed += 1;
                    let profit = record.profit.unwrap_or(0.0);
                    summary.realized_pnl += profit;
                    if record.is_winner() {
                        summary.wins += 1;
                    } else {
                        summary.losses += 1;
                    }
                }
            }
        }
        if summary.closed > 0 {
            summary.win_rate = summary.wins as f64 / summary.closed as f64;
        }
        summary
    }
}

/// Pretty JSON array of `records`, oldest first.
pub fn history_to_json(records: &[TradeHistoryRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use signalbot_core::domain::Ticket;

    fn record(id: u64, action: TradeAction, profit: Option<f64>) -> TradeHistoryRecord {
        TradeHistoryRecord {
            id,
            timestamp: Utc::now(),
            ticket: Ticket(1_000 + id),
            symbol: "EURUSD".into(),
            action,
            price: 1.0850,
            volume: 0.05,
            profit,
            reasoning: String::new(),
        }
    }

    #[test]
    fn empty_history() {
        assert_eq!(HistorySummary::from_records(&[]), HistorySummary::default());
    }

    #[test]
    fn counts_and_pnl() {
        let records = vec![
            record(1, TradeAction::Buy, None),
            record(2, TradeAction::Sell, None),
            record(3, TradeAction::Close, Some(12.5)),
            record(4, TradeAction::Close, Some(-4.0)),
        ];
        let s = HistorySummary::from_records(&records);
        assert_eq!(s.opened, 2);
        assert_eq!(s.closed, 2);
        assert_eq!(s.wins, 1);
        assert_eq!(s.losses, 1);
        assert!((s.realized_pnl - 8.5).abs() < 1e-12);
        assert_eq!(s.win_rate, 0.5);
    }

    #[test]
    fn json_export_is_an_array() {
        let json = history_to_json(&[record(1, TradeAction::Close, Some(1.0))]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));
        assert_eq!(value[0]["action"], "CLOSE");
    }
}
