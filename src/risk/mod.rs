//! Risk management module
//!
//! Protective threshold computation and trailing stop-loss state

mod thresholds;
mod trailing;

pub use thresholds::{compute_thresholds, round_price, RiskReward, Thresholds};
pub use trailing::{trailed_stop, TrailDecision, TrailingStopState};
