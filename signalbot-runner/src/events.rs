//! Outbound bot events.
//!
//! Observers subscribe for a bounded `mpsc` receiver. Publishing never
//! blocks: an event is delivered at most once, in emission order, and is
//! dropped for a subscriber whose queue is full. Subscribers whose receiver
//! has been dropped are pruned on the next publish. Late subscribers see
//! only events emitted after they subscribed.

use crate::bot::BotStatus;
use log::debug;
use serde::Serialize;
use signalbot_core::domain::{TradeHistoryRecord, TradeSignal};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};

/// Default per-subscriber queue depth.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BotEvent {
    StatusChanged(BotStatus),
    TradeExecuted(TradeHistoryRecord),
    AnalysisComplete(TradeSignal),
}

#[derive(Debug)]
pub struct EventBus {
    subscribers: Mutex<Vec<SyncSender<BotEvent>>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Receiver<BotEvent> {
        let (tx, rx) = sync_channel(self.capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber; returns how many received it.
    pub fn publish(&self, event: BotEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!("subscriber queue full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
