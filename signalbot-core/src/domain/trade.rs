//! TradeHistoryRecord: one append-only entry in the bot's trade log.

use super::ids::Ticket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Close,
}

/// A trade log entry. Never mutated after insertion.
///
/// `profit` is present only on CLOSE entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistoryRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub ticket: Ticket,
    pub symbol: String,
    pub action: TradeAction,
    pub price: f64,
    pub volume: f64,
    pub profit: Option<f64>,
    pub reasoning: String,
}

impl TradeHistoryRecord {
    pub fn is_close(&self) -> bool {
        self.action == TradeAction::Close
    }

    pub fn is_winner(&self) -> bool {
        self.profit.is_some_and(|p| p > 0.0)
    }
}
