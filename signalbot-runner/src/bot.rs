//! Bot orchestrator: lifecycle state machine and the per-tick trading cycle.
//!
//! ```text
//! idle ──connect──▶ connected ──start──▶ running ◀──resume── paused
//!                                          └───────pause/stop──▶┘
//! any ──connect failure──▶ error
//! ```
//!
//! One tick, only while `running`:
//! 1. fetch a 100-bar window from the bridge
//! 2. compose a signal
//! 3. emit `AnalysisComplete`
//! 4. open a position if the signal clears every gate
//! 5. diff the bridge's open set against the last snapshot, record a CLOSE
//!    for every vanished ticket and feed its outcome to the model

use crate::config::BotConfig;
use crate::events::{BotEvent, EventBus};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use signalbot_core::composer::{AnalysisError, SignalComposer};
use signalbot_core::domain::{
    AccountInfo, Action, Position, Side, Ticket, TradeAction, TradeHistoryRecord, TradeSignal,
};
use signalbot_core::features::FeatureVector;
use signalbot_core::market::{Bridge, BridgeError, Credentials, Settlement};
use signalbot_core::model::{DecisionModel, UpdateOutcome};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Candles requested per analysis tick.
pub const ANALYSIS_WINDOW: usize = 100;

pub const REASON_EXIT_LEVEL: &str = "stop loss or take profit";
pub const REASON_MANUAL_CLOSE: &str = "closed manually";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Idle,
    Connected,
    Running,
    Paused,
    Error,
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BotStatus::Idle => "idle",
            BotStatus::Connected => "connected",
            BotStatus::Running => "running",
            BotStatus::Paused => "paused",
            BotStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("cannot {action} while {status}")]
    InvalidTransition { action: &'static str, status: BotStatus },
}

/// What one completed tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub signal: TradeSignal,
    pub opened: Option<TradeHistoryRecord>,
    pub closed: Vec<TradeHistoryRecord>,
}

/// The decision that opened a ticket, kept until the ticket closes.
#[derive(Debug, Clone)]
struct Decision {
    features: Option<FeatureVector>,
    action: Action,
}

pub struct TradingBot<B: Bridge> {
    config: BotConfig,
    bridge: B,
    composer: SignalComposer,
    events: Arc<EventBus>,
    status: BotStatus,
    history: Vec<TradeHistoryRecord>,
    known: BTreeMap<Ticket, Position>,
    decisions: HashMap<Ticket, Decision>,
    updates: Vec<JoinHandle<()>>,
    next_record_id: u64,
}

impl<B: Bridge> TradingBot<B> {
    pub fn new(config: BotConfig, bridge: B, model: Arc<DecisionModel>) -> Self {
        Self::with_composer(config, bridge, SignalComposer::new(model))
    }

    pub fn with_composer(config: BotConfig, bridge: B, composer: SignalComposer) -> Self {
        Self {
            config,
            bridge,
            composer,
            events: Arc::new(EventBus::default()),
            status: BotStatus::Idle,
            history: Vec::new(),
            known: BTreeMap::new(),
            decisions: HashMap::new(),
            updates: Vec::new(),
            next_record_id: 1,
        }
    }

    /// Publish events on a shared bus instead of the bot's own.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn status(&self) -> BotStatus {
        self.status
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Trade log, oldest first.
    pub fn history(&self) -> &[TradeHistoryRecord] {
        &self.history
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    pub fn model(&self) -> Option<&Arc<DecisionModel>> {
        self.composer.model()
    }

    /// Positions as of the last reconciliation.
    pub fn known_positions(&self) -> impl Iterator<Item = &Position> {
        self.known.values()
    }

    pub fn account(&self) -> Result<AccountInfo, BotError> {
        Ok(self.bridge.account_info()?)
    }

    fn set_status(&mut self, status: BotStatus) {
        if self.status == status {
            return;
        }
        info!("bot status: {} -> {}", self.status, status);
        self.status = status;
        self.events.publish(BotEvent::StatusChanged(status));
    }

    fn append(&mut self, mut record: TradeHistoryRecord) -> TradeHistoryRecord {
        record.id = self.next_record_id;
        self.next_record_id += 1;
        self.history.push(record.clone());
        self.events.publish(BotEvent::TradeExecuted(record.clone()));
        record
    }

    /// Connect the bridge, then reconcile against its open set so positions
    /// that closed while disconnected get their CLOSE records.
    pub fn connect(&mut self, credentials: &Credentials) -> Result<(), BotError> {
        if matches!(self.status, BotStatus::Running | BotStatus::Paused) {
            return Err(BotError::InvalidTransition {
                action: "connect",
                status: self.status,
            });
        }
        match self.bridge.connect(credentials) {
            Ok(true) => {
                match self.bridge.positions() {
                    Ok(current) => {
                        self.reconcile(current);
                    }
                    Err(e) => warn!("could not reconcile positions after connect: {e}"),
                }
                self.set_status(BotStatus::Connected);
                Ok(())
            }
            Ok(false) => {
                self.set_status(BotStatus::Error);
                Err(BridgeError::Auth("connection refused".into()).into())
            }
            Err(e) => {
                warn!("connect failed: {e}");
                self.set_status(BotStatus::Error);
                Err(e.into())
            }
        }
    }

    /// Drop the bridge connection. Known positions are kept; the broker
    /// still holds them.
    pub fn disconnect(&mut self) {
        self.bridge.disconnect();
        self.set_status(BotStatus::Idle);
    }

    /// Enter `running`. Returns `false` if already running.
    pub fn start(&mut self) -> Result<bool, BotError> {
        match self.status {
            BotStatus::Running => Ok(false),
            BotStatus::Connected | BotStatus::Paused => {
                self.set_status(BotStatus::Running);
                Ok(true)
            }
            status => Err(BotError::InvalidTransition {
                action: "start",
                status,
            }),
        }
    }

    /// Leave `running` for `paused`. No-op in any other state.
    pub fn pause(&mut self) -> bool {
        if self.status == BotStatus::Running {
            self.set_status(BotStatus::Paused);
            true
        } else {
            false
        }
    }

    /// Same as [`pause`](Self::pause): a stopped bot is paused, never idle.
    pub fn stop(&mut self) -> bool {
        self.pause()
    }

    /// Re-enter `running`, only from `paused`.
    pub fn resume(&mut self) -> bool {
        if self.status == BotStatus::Paused {
            self.set_status(BotStatus::Running);
            true
        } else {
            false
        }
    }

    /// Run one trading cycle. `Ok(None)` when the bot is not running.
    ///
    /// Any failure ends the tick early; nothing already recorded is undone.
    pub fn tick(&mut self) -> Result<Option<TickReport>, BotError> {
        if self.status != BotStatus::Running {
            return Ok(None);
        }

        let symbol = self.config.symbol.clone();
        let candles = self.bridge.market_data(&symbol, ANALYSIS_WINDOW)?;
        let analysis = self.composer.analyze(&candles)?;
        let signal = analysis.signal.clone();
        debug!(
            "{symbol}: {} {:.1}% ({})",
            signal.action, signal.confidence, signal.reasoning
        );
        self.events.publish(BotEvent::AnalysisComplete(signal.clone()));

        let opened = if self.should_open(&signal) {
            self.open(&signal, analysis.features)?
        } else {
            None
        };

        let current = self.bridge.positions()?;
        let closed = self.reconcile(current);

        Ok(Some(TickReport {
            signal,
            opened,
            closed,
        }))
    }

    fn should_open(&self, signal: &TradeSignal) -> bool {
        let Some(side) = signal.action.side() else {
            return false;
        };
        if signal.confidence < self.config.min_confidence {
            return false;
        }
        if self.known.len() >= self.config.max_positions {
            debug!("position limit {} reached", self.config.max_positions);
            return false;
        }
        let duplicate = self
            .known
            .values()
            .any(|p| p.symbol == self.config.symbol && p.side == side);
        if duplicate {
            debug!("already holding a {side} {}", self.config.symbol);
        }
        !duplicate
    }

    fn open(
        &mut self,
        signal: &TradeSignal,
        features: Option<FeatureVector>,
    ) -> Result<Option<TradeHistoryRecord>, BotError> {
        let Some(side) = signal.action.side() else {
            return Ok(None);
        };
        let position = self.bridge.open_position(
            &self.config.symbol,
            side,
            signal.lot_size,
            signal.stop_loss,
            signal.take_profit,
        )?;

        self.decisions.insert(
            position.ticket,
            Decision {
                features,
                action: signal.action,
            },
        );
        let record = TradeHistoryRecord {
            id: 0,
            timestamp: Utc::now(),
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            action: match side {
                Side::Buy => TradeAction::Buy,
                Side::Sell => TradeAction::Sell,
            },
            price: position.open_price,
            volume: position.volume,
            profit: None,
            reasoning: signal.reasoning.clone(),
        };
        self.known.insert(position.ticket, position);
        Ok(Some(self.append(record)))
    }

    /// Record a CLOSE for every known ticket missing from `current`, then adopt `current`.
    fn reconcile(&mut self, current: Vec<Position>) -> Vec<TradeHistoryRecord> {
        let current: BTreeMap<Ticket, Position> =
            current.into_iter().map(|p| (p.ticket, p)).collect();
        let vanished: Vec<Position> = self
            .known
            .values()
            .filter(|p| !current.contains_key(&p.ticket))
            .cloned()
            .collect();
        self.known = current;

        vanished
            .into_iter()
            .map(|last| {
                let settled = self.bridge.settlement(last.ticket).unwrap_or(Settlement {
                    price: last.current_price,
                    profit: last.profit,
                });
                info!(
                    "{} closed externally @ {:.5}, profit {:.2}",
                    last.ticket, settled.price, settled.profit
                );
                self.record_close(&last, settled, REASON_EXIT_LEVEL)
            })
            .collect()
    }

    fn record_close(
        &mut self,
        last: &Position,
        settled: Settlement,
        reasoning: &str,
    ) -> TradeHistoryRecord {
        self.learn(last.ticket, settled.profit);
        self.append(TradeHistoryRecord {
            id: 0,
            timestamp: Utc::now(),
            ticket: last.ticket,
            symbol: last.symbol.clone(),
            action: TradeAction::Close,
            price: settled.price,
            volume: last.volume,
            profit: Some(settled.profit),
            reasoning: reasoning.to_string(),
        })
    }

    /// Feed a closed ticket's outcome back to the model.
    fn learn(&mut self, ticket: Ticket, profit: f64) {
        let Some(decision) = self.decisions.remove(&ticket) else {
            return;
        };
        let (Some(features), Some(model)) = (decision.features, self.composer.model()) else {
            return;
        };
        let model = Arc::clone(model);
        let action = decision.action;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                self.updates.retain(|update| !update.is_finished());
                self.updates.push(
                    handle.spawn_blocking(move || report_update(&model, &features, action, profit)),
                );
            }
            Err(_) => report_update(&model, &features, action, profit),
        }
    }

    /// Close every open position, regardless of bot state.
    pub fn close_all_positions(&mut self) -> Result<Vec<TradeHistoryRecord>, BotError> {
        let current = self.bridge.positions()?;
        let mut records = self.reconcile(current);

        let open: Vec<Position> = self.known.values().cloned().collect();
        for position in open {
            let profit = self.bridge.close_position(position.ticket)?;
            self.known.remove(&position.ticket);
            let price = match self.bridge.settlement(position.ticket) {
                Some(settled) => settled.price,
                None => self
                    .bridge
                    .current_price(&position.symbol)
                    .unwrap_or(position.current_price),
            };
            let settled = Settlement { price, profit };
            records.push(self.record_close(&position, settled, REASON_MANUAL_CLOSE));
        }
        Ok(records)
    }

    /// Hand over model updates still running on the blocking pool.
    pub fn take_pending_updates(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.updates)
    }
}

fn report_update(model: &DecisionModel, features: &FeatureVector, action: Action, profit: f64) {
    match model.online_update(features, action, profit) {
        Ok(UpdateOutcome::Applied { target }) => {
            debug!("model reinforced {target} after {action} ({profit:+.2})")
        }
        Ok(UpdateOutcome::Skipped) => debug!("learning busy, outcome dropped"),
        Ok(UpdateOutcome::NoTarget) => {}
        Err(e) => warn!("online update failed: {e}"),
    }
}

impl<B: Bridge + fmt::Debug> fmt::Debug for TradingBot<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradingBot")
            .field("config", &self.config)
            .field("status", &self.status)
            .field("bridge", &self.bridge)
            .field("open", &self.known.len())
            .field("history", &self.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalbot_core::market::{MarketSimulator, SimulatorConfig};
    use signalbot_core::model::ModelParams;

    fn biased_model(action: Action) -> Arc<DecisionModel> {
        let mut params = ModelParams::zeros();
        params.output_bias[action.index()] = 5.0;
        Arc::new(DecisionModel::from_params(params).unwrap())
    }

    fn creds() -> Credentials {
        Credentials::new("5001", "Sim-Demo", "pw")
    }

    fn bot(action: Action) -> TradingBot<MarketSimulator> {
        TradingBot::new(
            BotConfig::default(),
            MarketSimulator::new(SimulatorConfig::default()),
            biased_model(action),
        )
    }

    fn running(action: Action) -> TradingBot<MarketSimulator> {
        let mut bot = bot(action);
        bot.connect(&creds()).unwrap();
        bot.start().unwrap();
        bot
    }

    #[test]
    fn lifecycle_transitions() {
        let mut bot = bot(Action::Hold);
        assert_eq!(bot.status(), BotStatus::Idle);
        assert!(matches!(
            bot.start(),
            Err(BotError::InvalidTransition { action: "start", status: BotStatus::Idle })
        ));

        bot.connect(&creds()).unwrap();
        assert_eq!(bot.status(), BotStatus::Connected);
        assert!(!bot.resume());
        assert!(bot.start().unwrap());
        assert!(!bot.start().unwrap());
        assert!(bot.pause());
        assert_eq!(bot.status(), BotStatus::Paused);
        assert!(!bot.stop());
        assert!(bot.resume());
        assert_eq!(bot.status(), BotStatus::Running);
        assert!(bot.stop());
        assert_eq!(bot.status(), BotStatus::Paused);
    }

    #[test]
    fn failed_connect_enters_error() {
        let mut bot = bot(Action::Hold);
        let err = bot.connect(&Credentials::new("5001", "", "pw")).unwrap_err();
        assert!(matches!(err, BotError::Bridge(BridgeError::Auth(_))));
        assert_eq!(bot.status(), BotStatus::Error);
        bot.connect(&creds()).unwrap();
        assert_eq!(bot.status(), BotStatus::Connected);
    }

    #[test]
    fn status_changes_are_published() {
        let mut bot = bot(Action::Hold);
        let rx = bot.events().subscribe();
        bot.connect(&creds()).unwrap();
        bot.start().unwrap();
        bot.start().unwrap();
        let statuses: Vec<BotEvent> = rx.try_iter().collect();
        assert_eq!(
            statuses,
            vec![
                BotEvent::StatusChanged(BotStatus::Connected),
                BotEvent::StatusChanged(BotStatus::Running),
            ]
        );
    }

    #[test]
    fn tick_outside_running_does_nothing() {
        let mut bot = bot(Action::Buy);
        bot.connect(&creds()).unwrap();
        assert_eq!(bot.tick().unwrap(), None);
        assert!(bot.history().is_empty());
    }

    #[test]
    fn confident_signal_opens_once_per_direction() {
        let mut bot = running(Action::Buy);
        let first = bot.tick().unwrap().unwrap();
        let opened = first.opened.expect("first tick opens");
        assert_eq!(opened.action, TradeAction::Buy);
        assert_eq!(opened.id, 1);
        assert_eq!(opened.volume, 0.05);

        let second = bot.tick().unwrap().unwrap();
        assert_eq!(second.signal.action, Action::Buy);
        assert!(second.opened.is_none());
        let buys = bot
            .history()
            .iter()
            .filter(|r| r.action == TradeAction::Buy)
            .count();
        assert_eq!(buys, 1);
    }

    #[test]
    fn low_confidence_is_ignored() {
        let config = BotConfig {
            min_confidence: 99.5,
            ..BotConfig::default()
        };
        let mut bot = TradingBot::new(
            config,
            MarketSimulator::new(SimulatorConfig::default()),
            biased_model(Action::Buy),
        );
        bot.connect(&creds()).unwrap();
        bot.start().unwrap();
        let report = bot.tick().unwrap().unwrap();
        assert_eq!(report.signal.action, Action::Buy);
        assert!(report.opened.is_none());
    }

    #[test]
    fn position_limit_blocks_new_orders() {
        let config = BotConfig {
            max_positions: 1,
            ..BotConfig::default()
        };
        let mut bot = TradingBot::new(
            config,
            MarketSimulator::new(SimulatorConfig::default()),
            biased_model(Action::Sell),
        );
        bot.connect(&creds()).unwrap();
        bot.bridge_mut()
            .open_position("EURUSD", Side::Buy, 0.01, 0.0, 0.0)
            .unwrap();
        bot.start().unwrap();
        // The externally opened BUY is adopted on the first reconciliation.
        assert!(bot.tick().unwrap().unwrap().opened.is_some());
        assert!(bot.tick().unwrap().unwrap().opened.is_none());
    }

    #[test]
    fn model_free_bot_never_trades() {
        let mut bot = TradingBot::with_composer(
            BotConfig::default(),
            MarketSimulator::new(SimulatorConfig::default()),
            SignalComposer::without_model(),
        );
        bot.connect(&creds()).unwrap();
        bot.start().unwrap();
        for _ in 0..5 {
            let report = bot.tick().unwrap().unwrap();
            assert_eq!(report.signal, TradeSignal::hold("insufficient data"));
        }
        assert!(bot.history().is_empty());
    }

    #[test]
    fn stop_loss_close_is_recorded_and_learned() {
        let mut bot = running(Action::Buy);
        let model = Arc::clone(bot.model().unwrap());
        let opened = bot.tick().unwrap().unwrap().opened.unwrap();
        let before = model.params().unwrap();

        let stop = bot.known_positions().next().unwrap().stop_loss;
        bot.bridge_mut().inject_tick("EURUSD", stop - 0.01).unwrap();

        let report = bot.tick().unwrap().unwrap();
        assert_eq!(report.closed.len(), 1);
        let close = &report.closed[0];
        assert_eq!(close.action, TradeAction::Close);
        assert_eq!(close.ticket, opened.ticket);
        assert_eq!(close.reasoning, REASON_EXIT_LEVEL);

        let deal = &bot.bridge().closed_deals()[0];
        assert_eq!(close.profit, Some(deal.profit));
        assert_eq!(close.price, deal.close_price);
        assert!(close.price < stop);
        assert_ne!(close.price, opened.price);
        assert!(deal.profit < 0.0);
        assert_eq!(bot.history().last(), Some(close));

        // A losing BUY reinforces SELL.
        assert_ne!(model.params().unwrap(), before);
    }

    #[test]
    fn close_all_works_while_paused() {
        let mut bot = running(Action::Sell);
        bot.tick().unwrap();
        bot.pause();
        let records = bot.close_all_positions().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, TradeAction::Close);
        assert_eq!(records[0].reasoning, REASON_MANUAL_CLOSE);
        assert!(bot.bridge_mut().positions().unwrap().is_empty());
        assert_eq!(bot.history().len(), 2);
    }

    #[test]
    fn bridge_errors_end_tick_without_state_change() {
        let mut bot = running(Action::Buy);
        bot.bridge_mut().disconnect();
        let err = bot.tick().unwrap_err();
        assert!(matches!(err, BotError::Bridge(BridgeError::NotConnected)));
        assert_eq!(bot.status(), BotStatus::Running);
    }

    #[test]
    fn reconnect_keeps_one_position_per_direction() {
        let mut bot = running(Action::Buy);
        assert!(bot.tick().unwrap().unwrap().opened.is_some());
        bot.disconnect();
        assert_eq!(bot.known_positions().count(), 1);

        bot.connect(&creds()).unwrap();
        bot.start().unwrap();
        let report = bot.tick().unwrap().unwrap();
        assert!(report.opened.is_none());
        let buys = bot
            .bridge_mut()
            .positions()
            .unwrap()
            .into_iter()
            .filter(|p| p.side == Side::Buy)
            .count();
        assert_eq!(buys, 1);
    }

    #[test]
    fn exit_hit_across_reconnect_is_recorded() {
        let mut bot = running(Action::Buy);
        let opened = bot.tick().unwrap().unwrap().opened.unwrap();
        let stop = bot.known_positions().next().unwrap().stop_loss;
        bot.disconnect();

        bot.connect(&creds()).unwrap();
        bot.bridge_mut().inject_tick("EURUSD", stop - 0.01).unwrap();
        bot.start().unwrap();
        let report = bot.tick().unwrap().unwrap();

        assert_eq!(bot.bridge().closed_deals().len(), 1);
        let closes: Vec<_> = bot
            .history()
            .iter()
            .filter(|r| r.action == TradeAction::Close)
            .collect();
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].ticket, opened.ticket);
        assert!(report.closed.iter().any(|r| r.ticket == opened.ticket));
    }

    #[test]
    fn exit_hit_while_disconnected_is_recorded_on_connect() {
        let mut bot = running(Action::Buy);
        let opened = bot.tick().unwrap().unwrap().opened.unwrap();
        let stop = bot.known_positions().next().unwrap().stop_loss;
        bot.disconnect();

        bot.bridge_mut().connect(&creds()).unwrap();
        bot.bridge_mut().inject_tick("EURUSD", stop - 0.01).unwrap();
        bot.bridge_mut().disconnect();

        bot.connect(&creds()).unwrap();
        assert_eq!(bot.known_positions().count(), 0);
        let close = bot.history().last().unwrap();
        assert_eq!(close.action, TradeAction::Close);
        assert_eq!(close.ticket, opened.ticket);
        assert_eq!(close.price, stop - 0.01);
    }
}
