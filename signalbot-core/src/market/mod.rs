//! Market bridge: the boundary between the bot and a (simulated) broker.
//!
//! The [`Bridge`] trait abstracts over market back ends so the orchestrator
//! can be driven by the in-process [`MarketSimulator`] or by a real broker
//! adapter. All position and price state lives behind the bridge; callers
//! only ever see snapshots.

pub mod history;
pub mod simulator;

pub use history::CandleHistory;
pub use simulator::{ClosedDeal, CloseReason, MarketSimulator, SimulatorConfig};

use crate::domain::{AccountInfo, Candle, Position, Side, Ticket};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Structured bridge failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not connected to the market")]
    NotConnected,

    #[error("position {ticket} not found")]
    NotFound { ticket: Ticket },

    #[error("no price history for symbol '{symbol}'")]
    UnknownSymbol { symbol: String },

    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

impl BridgeError {
    /// Whether this failure means the connection itself is unusable.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, BridgeError::Auth(_) | BridgeError::NotConnected)
    }
}

/// Broker login details.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub login: String,
    pub server: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, server: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            server: server.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("server", &self.server)
            .field("password", &"***")
            .finish()
    }
}

/// Operations the bot needs from a market back end.
///
/// `positions` is side-effecting: it marks every position to market and
/// closes those whose stop-loss or take-profit has been crossed before
/// returning the remaining set.
pub trait Bridge: Send {
    fn connect(&mut self, credentials: &Credentials) -> Result<bool, BridgeError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// The last `bars` candles for `symbol`, oldest first.
    fn market_data(&mut self, symbol: &str, bars: usize) -> Result<Vec<Candle>, BridgeError>;

    fn open_position(
        &mut self,
        symbol: &str,
        side: Side,
        volume: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Result<Position, BridgeError>;

    /// Close `ticket` at market and return the realized profit.
    fn close_position(&mut self, ticket: Ticket) -> Result<f64, BridgeError>;

    fn positions(&mut self) -> Result<Vec<Position>, BridgeError>;

    fn account_info(&self) -> Result<AccountInfo, BridgeError>;

    fn current_price(&self, symbol: &str) -> Result<f64, BridgeError>;

    /// How a closed ticket was settled, if the back end keeps a deal log.
    fn settlement(&self, _ticket: Ticket) -> Option<Settlement> {
        None
    }
}

/// Exit price and realized profit of a closed ticket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub price: f64,
    pub profit: f64,
}
