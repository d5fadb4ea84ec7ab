//! In-process simulated market.
//!
//! Prices follow a bounded multiplicative random walk, one 1-minute candle per
//! market-data request. Positions fill at the latest close, are marked to the
//! latest close on every position query, and are auto-closed as soon as that
//! close crosses their own stop-loss or take-profit. Account figures are
//! always derived from the realized balance and the open set, never cached.

use super::history::CandleHistory;
use super::{Bridge, BridgeError, Credentials, Settlement};
use crate::domain::{AccountInfo, Candle, Position, Side, Ticket, TicketSequence};
use crate::rng::RngHierarchy;
use chrono::{DateTime, Duration, DurationRound, Utc};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Candles retained per symbol.
pub const HISTORY_CAPACITY: usize = 200;
/// Candles generated when a symbol is first seeded.
pub const SEED_BARS: usize = 101;

/// Simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Master seed for every price stream.
    pub seed: u64,
    pub initial_balance: f64,
    pub leverage: f64,
    /// Largest per-bar relative move: ε is uniform in [-volatility, volatility].
    pub volatility: f64,
    /// Symbols seeded on connect. Others are seeded on first request.
    pub symbols: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            initial_balance: 10_000.0,
            leverage: 100.0,
            volatility: 0.001,
            symbols: vec!["EURUSD".to_string()],
        }
    }
}

/// Starting price for a simulated symbol.
pub fn base_price(symbol: &str) -> f64 {
    match symbol {
        "EURUSD" => 1.085,
        "GBPUSD" => 1.265,
        "USDJPY" => 149.5,
        "XAUUSD" => 2030.0,
        "BTCUSD" => 43_000.0,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Manual,
    StopLoss,
    TakeProfit,
}

/// A position that has left the open set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedDeal {
    pub position: Position,
    pub close_price: f64,
    pub profit: f64,
    pub reason: CloseReason,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug)]
struct PriceFeed {
    history: CandleHistory,
    rng: StdRng,
}

impl PriceFeed {
    fn last_close(&self) -> Option<f64> {
        self.history.last().map(|c| c.close)
    }
}

/// The simulated broker.
#[derive(Debug)]
pub struct MarketSimulator {
    config: SimulatorConfig,
    rng: RngHierarchy,
    connected: bool,
    feeds: HashMap<String, PriceFeed>,
    positions: Vec<Position>,
    balance: f64,
    tickets: TicketSequence,
    deals: Vec<ClosedDeal>,
}

impl MarketSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: RngHierarchy::new(config.seed),
            balance: config.initial_balance,
            config,
            connected: false,
            feeds: HashMap::new(),
            positions: Vec::new(),
            tickets: TicketSequence::new(),
            deals: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Every position closed so far, manual or automatic, in closing order.
    pub fn closed_deals(&self) -> &[ClosedDeal] {
        &self.deals
    }

    fn ensure_connected(&self) -> Result<(), BridgeError> {
        if self.connected {
            Ok(())
        } else {
            Err(BridgeError::NotConnected)
        }
    }

    /// Jittered candle following `prev_close` with the given close.
    fn shape_candle(
        rng: &mut StdRng,
        volatility: f64,
        timestamp: DateTime<Utc>,
        prev_close: f64,
        close: f64,
    ) -> Candle {
        let jitter = volatility / 4.0;
        let open = prev_close * (1.0 + rng.gen_range(-jitter..=jitter));
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..=jitter));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..=jitter));
        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(100..=1000) as f64,
        }
    }

    fn seed_feed(rng: &RngHierarchy, volatility: f64, symbol: &str) -> PriceFeed {
        let mut rng = rng.rng_for(&format!("market/{symbol}"), 0);
        let mut history = CandleHistory::with_capacity(HISTORY_CAPACITY);

        let now = Utc::now();
        let end = now.duration_trunc(Duration::minutes(1)).unwrap_or(now);
        let mut close = base_price(symbol);
        for i in 0..SEED_BARS {
            let timestamp = end - Duration::minutes((SEED_BARS - 1 - i) as i64);
            let prev = close;
            close = prev * (1.0 + rng.gen_range(-volatility..=volatility));
            history.push(Self::shape_candle(&mut rng, volatility, timestamp, prev, close));
        }

        debug!("seeded {SEED_BARS} candles for {symbol}");
        PriceFeed { history, rng }
    }

    /// Feed for `symbol`, seeding it on first use.
    fn feed_mut(&mut self, symbol: &str) -> &mut PriceFeed {
        let rng = &self.rng;
        let volatility = self.config.volatility;
        self.feeds
            .entry(symbol.to_string())
            .or_insert_with(|| Self::seed_feed(rng, volatility, symbol))
    }

    /// Advance `symbol` by one random-walk candle.
    fn advance(&mut self, symbol: &str) {
        let volatility = self.config.volatility;
        let feed = self.feed_mut(symbol);
        let Some(last) = feed.history.last().copied() else {
            return;
        };
        let close = last.close * (1.0 + feed.rng.gen_range(-volatility..=volatility));
        let candle = Self::shape_candle(
            &mut feed.rng,
            volatility,
            last.timestamp + Duration::minutes(1),
            last.close,
            close,
        );
        feed.history.push(candle);
    }

    /// Append a scripted candle closing at `close`.
    pub fn inject_tick(&mut self, symbol: &str, close: f64) -> Result<Candle, BridgeError> {
        self.ensure_connected()?;
        let volatility = self.config.volatility;
        let feed = self.feed_mut(symbol);
        let last = feed
            .history
            .last()
            .copied()
            .ok_or_else(|| BridgeError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        let mut candle = Self::shape_candle(
            &mut feed.rng,
            volatility,
            last.timestamp + Duration::minutes(1),
            last.close,
            close,
        );
        candle.open = last.close;
        candle.high = candle.high.max(last.close).max(close);
        candle.low = candle.low.min(last.close).min(close);
        feed.history.push(candle);
        Ok(candle)
    }

    fn latest_close(&self, symbol: &str) -> Option<f64> {
        self.feeds.get(symbol).and_then(PriceFeed::last_close)
    }

    /// Open positions marked to the latest close, without closing anything.
    fn marked_positions(&self) -> Vec<Position> {
        self.positions
            .iter()
            .cloned()
            .map(|mut p| {
                if let Some(price) = self.latest_close(&p.symbol) {
                    p.mark(price);
                }
                p
            })
            .collect()
    }

    fn settle(&mut self, position: Position, reason: CloseReason) -> f64 {
        let profit = position.profit;
        self.balance += profit;
        info!(
            "closed {} {} {} {:.2} lots @ {:.5} ({:?}), profit {:.2}",
            position.ticket,
            position.side,
            position.symbol,
            position.volume,
            position.current_price,
            reason,
            profit
        );
        self.deals.push(ClosedDeal {
            close_price: position.current_price,
            profit,
            reason,
            closed_at: Utc::now(),
            position,
        });
        profit
    }
}

impl Bridge for MarketSimulator {
    fn connect(&mut self, credentials: &Credentials) -> Result<bool, BridgeError> {
        if credentials.login.trim().is_empty()
            || credentials.password.is_empty()
            || credentials.server.trim().is_empty()
        {
            warn!("rejected connection attempt: incomplete credentials");
            return Err(BridgeError::Auth(
                "login, password and server are required".into(),
            ));
        }
        self.connected = true;
        for symbol in self.config.symbols.clone() {
            self.feed_mut(&symbol);
        }
        info!("connected to {} as {}", credentials.server, credentials.login);
        Ok(true)
    }

    fn disconnect(&mut self) {
        if self.connected {
            info!("disconnected from simulated market");
        }
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn market_data(&mut self, symbol: &str, bars: usize) -> Result<Vec<Candle>, BridgeError> {
        self.ensure_connected()?;
        self.advance(symbol);
        Ok(self.feed_mut(symbol).history.tail(bars))
    }

    fn open_position(
        &mut self,
        symbol: &str,
        side: Side,
        volume: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Result<Position, BridgeError> {
        self.ensure_connected()?;
        if !(volume.is_finite() && volume > 0.0) {
            return Err(BridgeError::InvalidOrder(format!(
                "volume must be positive, got {volume}"
            )));
        }

        let price = match self.feed_mut(symbol).last_close() {
            Some(price) => price,
            None => {
                return Err(BridgeError::UnknownSymbol {
                    symbol: symbol.to_string(),
                })
            }
        };

        let position = Position {
            ticket: self.tickets.next(),
            symbol: symbol.to_string(),
            side,
            volume,
            open_price: price,
            current_price: price,
            profit: 0.0,
            stop_loss,
            take_profit,
            open_time: Utc::now(),
        };
        info!(
            "opened {} {side} {symbol} {volume:.2} lots @ {price:.5} (sl {stop_loss:.5}, tp {take_profit:.5})",
            position.ticket
        );
        self.positions.push(position.clone());
        Ok(position)
    }

    fn close_position(&mut self, ticket: Ticket) -> Result<f64, BridgeError> {
        self.ensure_connected()?;
        let index = self
            .positions
            .iter()
            .position(|p| p.ticket == ticket)
            .ok_or(BridgeError::NotFound { ticket })?;

        let mut position = self.positions.remove(index);
        if let Some(price) = self.latest_close(&position.symbol) {
            position.mark(price);
        }
        Ok(self.settle(position, CloseReason::Manual))
    }

    fn positions(&mut self) -> Result<Vec<Position>, BridgeError> {
        self.ensure_connected()?;
        let marked = self.marked_positions();
        let (triggered, open): (Vec<Position>, Vec<Position>) =
            marked.into_iter().partition(Position::exit_triggered);

        self.positions = open;
        for position in triggered {
            let stopped = match position.side {
                Side::Buy => position.stop_loss > 0.0 && position.current_price <= position.stop_loss,
                Side::Sell => position.stop_loss > 0.0 && position.current_price >= position.stop_loss,
            };
            let reason = if stopped {
                CloseReason::StopLoss
            } else {
                CloseReason::TakeProfit
            };
            self.settle(position, reason);
        }

        Ok(self.positions.clone())
    }

    fn account_info(&self) -> Result<AccountInfo, BridgeError> {
        self.ensure_connected()?;
        Ok(AccountInfo::derive(
            self.balance,
            self.config.leverage,
            &self.marked_positions(),
        ))
    }

    fn current_price(&self, symbol: &str) -> Result<f64, BridgeError> {
        self.ensure_connected()?;
        self.latest_close(symbol)
            .ok_or_else(|| BridgeError::UnknownSymbol {
                symbol: symbol.to_string(),
            })
    }

    fn settlement(&self, ticket: Ticket) -> Option<Settlement> {
        self.deals
            .iter()
            .rev()
            .find(|d| d.position.ticket == ticket)
            .map(|d| Settlement {
                price: d.close_price,
                profit: d.profit,
            })
    }
}
