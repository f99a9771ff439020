//! risk-engine: position and risk control for margin-trading accounts
//!
//! This library provides the core components for:
//! - Take-profit / stop-loss threshold computation
//! - Position snapshots with derived profit percentage
//! - Filling-mode probing and order submission
//! - Per-symbol open/close/hold decisions
//! - Trailing stop-loss with per-symbol extremum tracking
//! - Paper and gateway-backed brokers
//! - Structured logging and Prometheus metrics

pub mod broker;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod position;
pub mod risk;
pub mod telemetry;

pub use engine::{DecisionReport, DecisionRequest, Intent, RiskEngine, TrailingTickReport};
pub use error::{EngineError, Result};
