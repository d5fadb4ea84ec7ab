//! Risk Manager: stop-loss, take-profit and lot size from ATR and confidence.
//!
//! # Formula
//! ```text
//! stop_distance   = 2 * ATR
//! target_distance = 3 * ATR
//! BUY:  stop = price - stop_distance, target = price + target_distance
//! SELL: stop = price + stop_distance, target = price - target_distance
//! lot = min(0.1 * probability, 0.05)
//! ```
//! HOLD carries no envelope: stop, target and lot are all zero.

use crate::domain::Action;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParameters {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub lot_size: f64,
}

impl RiskParameters {
    pub const NONE: RiskParameters = RiskParameters {
        stop_loss: 0.0,
        take_profit: 0.0,
        lot_size: 0.0,
    };
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    /// Stop distance in ATRs.
    pub stop_atr_multiple: f64,
    /// Target distance in ATRs.
    pub target_atr_multiple: f64,
    /// Lots per unit of probability.
    pub lot_per_confidence: f64,
    /// Hard lot cap.
    pub max_lot: f64,
}

impl Default for RiskManager {
    fn default() -> Self {
        Self {
            stop_atr_multiple: 2.0,
            target_atr_multiple: 3.0,
            lot_per_confidence: 0.1,
            max_lot: 0.05,
        }
    }
}

impl RiskManager {
    /// Lot size for a model probability in [0, 1].
    pub fn lot_size(&self, probability: f64) -> f64 {
        (self.lot_per_confidence * probability).min(self.max_lot)
    }

    pub fn assess(&self, action: Action, probability: f64, price: f64, atr: f64) -> RiskParameters {
        let Some(side) = action.side() else {
            return RiskParameters::NONE;
        };
        let stop_distance = self.stop_atr_multiple * atr;
        let target_distance = self.target_atr_multiple * atr;
        let sign = side.sign();
        RiskParameters {
            stop_loss: price - sign * stop_distance,
            take_profit: price + sign * target_distance,
            lot_size: self.lot_size(probability),
        }
    }
}
