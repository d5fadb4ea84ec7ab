//! Signalbot Runner: orchestration, scheduling, events and configuration.
//!
//! This crate builds on `signalbot-core` to provide:
//! - TOML configuration for the bot, simulator and model
//! - The bot state machine and its per-tick trading cycle
//! - A periodic scheduler with a cancellation handle
//! - A bounded, non-blocking event bus for observers
//! - An async controller owning the bot and its schedule
//! - Trade history summaries and JSON export

pub mod bot;
pub mod config;
pub mod controller;
pub mod events;
pub mod scheduler;
pub mod summary;

pub use bot::{BotError, BotStatus, TickReport, TradingBot};
pub use config::{AppConfig, BotConfig, ConfigError, ModelConfig};
pub use controller::BotController;
pub use events::{BotEvent, EventBus};
pub use scheduler::{Scheduler, TickHandle};
pub use summary::{history_to_json, HistorySummary};
