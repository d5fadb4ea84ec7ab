//! Async front end owning a bot and its tick schedule.
//!
//! The bot sits behind an async mutex; every scheduled tick locks it for the
//! whole cycle, so ticks never overlap with each other or with commands.

use crate::bot::{BotError, BotStatus, TickReport, TradingBot};
use crate::events::{BotEvent, EventBus};
use crate::scheduler::{Scheduler, TickHandle};
use log::warn;
use signalbot_core::domain::TradeHistoryRecord;
use signalbot_core::market::{Bridge, Credentials};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct BotController<B: Bridge + 'static> {
    bot: Arc<Mutex<TradingBot<B>>>,
    events: Arc<EventBus>,
    interval: Duration,
    ticker: Option<TickHandle>,
}

impl<B: Bridge + 'static> BotController<B> {
    pub fn new(bot: TradingBot<B>) -> Self {
        let events = Arc::clone(bot.events());
        let interval = bot.config().analysis_interval();
        Self {
            bot: Arc::new(Mutex::new(bot)),
            events,
            interval,
            ticker: None,
        }
    }

    /// Shared handle to the bot, for inspection.
    pub fn bot(&self) -> Arc<Mutex<TradingBot<B>>> {
        Arc::clone(&self.bot)
    }

    pub fn subscribe(&self) -> Receiver<BotEvent> {
        self.events.subscribe()
    }

    pub fn is_scheduled(&self) -> bool {
        self.ticker.is_some()
    }

    pub async fn status(&self) -> BotStatus {
        self.bot.lock().await.status()
    }

    pub async fn history(&self) -> Vec<TradeHistoryRecord> {
        self.bot.lock().await.history().to_vec()
    }

    pub async fn connect(&mut self, credentials: &Credentials) -> Result<(), BotError> {
        self.bot.lock().await.connect(credentials)
    }

    /// Start the bot and its schedule.
    pub async fn start(&mut self) -> Result<(), BotError> {
        self.bot.lock().await.start()?;
        self.schedule();
        Ok(())
    }

    /// Cancel the schedule and pause the bot. An in-flight tick finishes first.
    pub async fn pause(&mut self) -> bool {
        self.unschedule();
        self.bot.lock().await.pause()
    }

    pub async fn stop(&mut self) -> bool {
        self.pause().await
    }

    pub async fn resume(&mut self) -> bool {
        let resumed = self.bot.lock().await.resume();
        if resumed {
            self.schedule();
        }
        resumed
    }

    /// Run one cycle immediately, outside the schedule.
    pub async fn tick_now(&self) -> Result<Option<TickReport>, BotError> {
        self.bot.lock().await.tick()
    }

    pub async fn close_all_positions(&self) -> Result<Vec<TradeHistoryRecord>, BotError> {
        self.bot.lock().await.close_all_positions()
    }

    /// Cancel the schedule, wait for any in-flight tick, pause and disconnect.
    /// Returns once every model update started by the bot has finished.
    pub async fn shutdown(mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.shutdown().await;
        }
        let updates = {
            let mut bot = self.bot.lock().await;
            bot.pause();
            bot.disconnect();
            bot.take_pending_updates()
        };
        for update in updates {
            if let Err(e) = update.await {
                warn!("model update task failed: {e}");
            }
        }
    }

    fn schedule(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let bot = Arc::clone(&self.bot);
        self.ticker = Some(Scheduler::every(self.interval, move || {
            let bot = Arc::clone(&bot);
            async move {
                if let Err(e) = bot.lock().await.tick() {
                    warn!("tick failed: {e}");
                }
            }
        }));
    }

    fn unschedule(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}
