//! Domain types for the signal bot

pub mod account;
pub mod candle;
pub mod ids;
pub mod position;
pub mod signal;
pub mod trade;

pub use account::AccountInfo;
pub use candle::{closes, Candle};
pub use ids::{Ticket, TicketSequence};
pub use position::{Position, CONTRACT_SIZE};
pub use signal::{Action, Side, TradeSignal};
pub use trade::{TradeAction, TradeHistoryRecord};

/// Symbol type alias
pub type Symbol = String;
