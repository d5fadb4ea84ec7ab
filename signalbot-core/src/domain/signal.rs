//! Actions, order sides and the trade signal record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three-way decision produced by the model.
///
/// Variant order matches the model's output layer: BUY, SELL, HOLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Buy, Action::Sell, Action::Hold];

    /// Position of this action in a probability vector.
    pub fn index(self) -> usize {
        match self {
            Action::Buy => 0,
            Action::Sell => 1,
            Action::Hold => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Action> {
        Self::ALL.get(index).copied()
    }

    /// Order side for directional actions; `None` for HOLD.
    pub fn side(self) -> Option<Side> {
        match self {
            Action::Buy => Some(Side::Buy),
            Action::Sell => Some(Side::Sell),
            Action::Hold => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn action(self) -> Action {
        match self {
            Side::Buy => Action::Buy,
            Side::Sell => Action::Sell,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.action().fmt(f)
    }
}

/// One analysis result: what to do, how sure, and the risk envelope.
///
/// `confidence` is on a 0–100 scale. For HOLD, `stop_loss`, `take_profit`
/// and `lot_size` are all zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: Action,
    pub confidence: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
    pub reasoning: String,
}

impl TradeSignal {
    /// A zero-confidence HOLD carrying only an explanation.
    pub fn hold(reasoning: impl Into<String>) -> Self {
        Self {
            action: Action::Hold,
            confidence: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            lot_size: 0.0,
            reasoning: reasoning.into(),
        }
    }

    pub fn is_actionable(&self, min_confidence: f64) -> bool {
        self.action != Action::Hold && self.confidence >= min_confidence
    }
}
