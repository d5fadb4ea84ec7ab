//! Signal Composer: candles in, one immutable [`TradeSignal`] out.
//!
//! Pipeline: features → model probabilities → risk envelope → rationale.
//! Windows shorter than [`MIN_CANDLES`] (or a composer without a model)
//! yield a zero-confidence HOLD without touching the model.

use crate::domain::{closes, Action, Candle, TradeSignal};
use crate::features::{extract, FeatureError, FeatureVector, MIN_CANDLES};
use crate::indicators::{atr, macd, rsi, ATR_PERIOD, RSI_PERIOD};
use crate::model::{ActionProbabilities, DecisionModel, ModelError};
use crate::risk::{RiskManager, RiskParameters};
use std::sync::Arc;
use thiserror::Error;

pub const INSUFFICIENT_DATA: &str = "insufficient data";
pub const CONDITIONS_UNCLEAR: &str = "conditions unclear";
pub const NO_VOLATILITY: &str = "no measurable volatility";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("feature extraction failed: {0}")]
    Features(#[from] FeatureError),

    #[error("model inference failed: {0}")]
    Model(#[from] ModelError),
}

/// Indicator readings the rationale is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    pub price: f64,
    pub atr: f64,
    pub rsi: f64,
    pub macd_histogram: f64,
    /// Close 5 bars ago, if the window is long enough.
    pub close_5_ago: Option<f64>,
}

impl MarketContext {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let closes = closes(candles);
        let n = closes.len();
        Self {
            price: closes.last().copied().unwrap_or(0.0),
            atr: atr(candles, ATR_PERIOD),
            rsi: rsi(&closes, RSI_PERIOD),
            macd_histogram: macd(&closes).histogram,
            close_5_ago: n.checked_sub(6).map(|i| closes[i]),
        }
    }

    fn uptrend(&self) -> bool {
        self.close_5_ago.is_some_and(|past| self.price > past)
    }

    fn downtrend(&self) -> bool {
        self.close_5_ago.is_some_and(|past| self.price < past)
    }
}

/// Short rule-based explanation of a decision.
pub fn rationale(action: Action, ctx: &MarketContext) -> String {
    let mut reasons: Vec<&str> = Vec::new();
    match action {
        Action::Buy => {
            if ctx.rsi < 30.0 {
                reasons.push("RSI oversold");
            }
            if ctx.macd_histogram > 0.0 {
                reasons.push("MACD bullish");
            }
            if ctx.uptrend() {
                reasons.push("5-bar uptrend");
            }
        }
        Action::Sell => {
            if ctx.rsi > 70.0 {
                reasons.push("RSI overbought");
            }
            if ctx.macd_histogram < 0.0 {
                reasons.push("MACD bearish");
            }
            if ctx.downtrend() {
                reasons.push("5-bar downtrend");
            }
        }
        Action::Hold => return CONDITIONS_UNCLEAR.to_string(),
    }

    if reasons.is_empty() {
        format!("{action} on model conviction")
    } else {
        reasons.join(", ")
    }
}

/// Everything one analysis tick produced.
///
/// `features` and `probabilities` are `None` when the model was not consulted.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub signal: TradeSignal,
    pub price: f64,
    pub features: Option<FeatureVector>,
    pub probabilities: Option<ActionProbabilities>,
}

impl Analysis {
    fn hold(reasoning: &str, price: f64) -> Self {
        Self {
            signal: TradeSignal::hold(reasoning),
            price,
            features: None,
            probabilities: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalComposer {
    model: Option<Arc<DecisionModel>>,
    risk: RiskManager,
}

impl SignalComposer {
    pub fn new(model: Arc<DecisionModel>) -> Self {
        Self {
            model: Some(model),
            risk: RiskManager::default(),
        }
    }

    /// A composer with no model; every analysis is a HOLD.
    pub fn without_model() -> Self {
        Self {
            model: None,
            risk: RiskManager::default(),
        }
    }

    pub fn with_risk_manager(mut self, risk: RiskManager) -> Self {
        self.risk = risk;
        self
    }

    pub fn model(&self) -> Option<&Arc<DecisionModel>> {
        self.model.as_ref()
    }

    pub fn analyze(&self, candles: &[Candle]) -> Result<Analysis, AnalysisError> {
        let price = candles.last().map(|c| c.close).unwrap_or(0.0);
        let model = match &self.model {
            Some(model) if candles.len() >= MIN_CANDLES => model,
            _ => return Ok(Analysis::hold(INSUFFICIENT_DATA, price)),
        };

        let features = extract(candles)?;
        let probabilities = model.predict(&features)?;
        let (mut action, probability) = probabilities.best();
        let ctx = MarketContext::from_candles(candles);

        let mut reasoning = None;
        if action != Action::Hold && ctx.atr <= 0.0 {
            action = Action::Hold;
            reasoning = Some(NO_VOLATILITY.to_string());
        }

        let envelope = if action == Action::Hold {
            RiskParameters::NONE
        } else {
            self.risk.assess(action, probability, ctx.price, ctx.atr)
        };

        let signal = TradeSignal {
            action,
            confidence: (probability * 100.0).clamp(0.0, 100.0),
            stop_loss: envelope.stop_loss,
            take_profit: envelope.take_profit,
            lot_size: envelope.lot_size,
            reasoning: reasoning.unwrap_or_else(|| rationale(action, &ctx)),
        };

        Ok(Analysis {
            signal,
            price,
            features: Some(features),
            probabilities: Some(probabilities),
        })
    }

    pub fn signal(&self, candles: &[Candle]) -> Result<TradeSignal, AnalysisError> {
        Ok(self.analyze(candles)?.signal)
    }
}
