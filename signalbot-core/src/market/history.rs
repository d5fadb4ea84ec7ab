//! Bounded per-symbol candle history.

use crate::domain::Candle;
use std::collections::VecDeque;

/// Fixed-capacity ring of candles; pushing past capacity evicts the oldest in O(1).
#[derive(Debug, Clone)]
pub struct CandleHistory {
    candles: VecDeque<Candle>,
    capacity: usize,
}

impl CandleHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a candle, returning the evicted one if the ring was full.
    pub fn push(&mut self, candle: Candle) -> Option<Candle> {
        let evicted = if self.candles.len() == self.capacity {
            self.candles.pop_front()
        } else {
            None
        };
        self.candles.push_back(candle);
        evicted
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// The newest `count` candles, oldest first.
    pub fn tail(&self, count: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(count);
        self.candles.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
