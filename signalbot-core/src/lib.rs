//! Signalbot Core: market data, indicators, decision model, risk and the simulated bridge.
//!
//! This crate contains everything a single analysis tick needs:
//! - Domain types (candles, signals, positions, account snapshots, trade records)
//! - Pure technical indicators and the 20-feature extractor
//! - The online-learning decision model
//! - Risk envelope and signal composition
//! - The `Bridge` trait and the in-process market simulator

pub mod composer;
pub mod domain;
pub mod features;
pub mod indicators;
pub mod market;
pub mod model;
pub mod risk;
pub mod rng;

pub use composer::{Analysis, AnalysisError, SignalComposer};
pub use features::{FeatureVector, FEATURE_COUNT, MIN_CANDLES};
pub use market::{Bridge, BridgeError, Credentials, MarketSimulator, Settlement, SimulatorConfig};
pub use model::{DecisionModel, ModelError, UpdateOutcome};
pub use risk::RiskManager;
