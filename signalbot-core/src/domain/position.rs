use super::ids::Ticket;
use super::signal::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Units of the base currency in one standard lot.
pub const CONTRACT_SIZE: f64 = 100_000.0;

/// An open position in the simulated market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: Ticket,
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub open_price: f64,
    pub current_price: f64,
    pub profit: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub open_time: DateTime<Utc>,
}

impl Position {
    /// Mark to `price`: direction-signed price difference times notional.
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.profit = self.side.sign() * (price - self.open_price) * self.volume * CONTRACT_SIZE;
    }

    /// Whether the current price has crossed this position's own stop or target.
    ///
    /// A level of zero means "not set".
    pub fn exit_triggered(&self) -> bool {
        let price = self.current_price;
        let stop = self.stop_loss > 0.0;
        let target = self.take_profit > 0.0;
        match self.side {
            Side::Buy => (stop && price <= self.stop_loss) || (target && price >= self.take_profit),
            Side::Sell => (stop && price >= self.stop_loss) || (target && price <= self.take_profit),
        }
    }

    /// Margin held against this position.
    pub fn margin(&self, leverage: f64) -> f64 {
        self.volume * self.open_price * CONTRACT_SIZE / leverage
    }
}
