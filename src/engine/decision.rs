//! Decision planning
//!
//! Maps the current per-symbol position state and the caller's intent to
//! the broker actions to take. Pure; the engine executes the plan.

use crate::broker::OrderResult;
use crate::config::ReversalPolicy;
use crate::position::{PositionState, Side};
use crate::risk::RiskReward;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// What the caller wants for a symbol this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Intent {
    pub want_buy: bool,
    pub want_sell: bool,
}

impl Intent {
    pub fn buy() -> Self {
        Self {
            want_buy: true,
            want_sell: false,
        }
    }

    pub fn sell() -> Self {
        Self {
            want_buy: false,
            want_sell: true,
        }
    }

    pub fn flat() -> Self {
        Self::default()
    }

    /// Both directions requested at once
    pub fn is_contradictory(&self) -> bool {
        self.want_buy && self.want_sell
    }
}

/// A broker-mutating step of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Open { side: Side },
    Close { side: Side, ticket: u64, volume: Decimal },
}

/// Plan the actions for one symbol
pub fn plan(state: &PositionState, intent: Intent, policy: ReversalPolicy) -> Vec<Action> {
    if intent.is_contradictory() {
        return vec![];
    }

    let wanted = if intent.want_buy {
        Some(Side::Long)
    } else if intent.want_sell {
        Some(Side::Short)
    } else {
        None
    };

    match (state.position(), wanted) {
        (_, None) => vec![],
        (None, Some(side)) => vec![Action::Open { side }],
        (Some(position), Some(side)) if position.side == side => vec![],
        (Some(position), Some(side)) => {
            let close = Action::Close {
                side: position.side,
                ticket: position.ticket,
                volume: position.volume,
            };
            match policy {
                ReversalPolicy::TwoTick => vec![close],
                ReversalPolicy::SameTick => vec![close, Action::Open { side }],
            }
        }
    }
}

/// Inputs of one decision run
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub symbol: String,
    pub intent: Intent,
    /// Lot size for a new position
    pub volume: Decimal,
    pub risk_reward: RiskReward,
}

/// One executed action with the account balance around it
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub action: Action,
    pub result: OrderResult,
    pub balance_before: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    /// Balance change in percent, three decimals
    pub balance_change_pct: Option<Decimal>,
}

/// Outcome of one decision run
#[derive(Debug, Clone, Serialize)]
pub struct DecisionReport {
    pub symbol: String,
    pub decided_at: DateTime<Utc>,
    /// Position state before any action ("none", "long", "short")
    pub prior_state: &'static str,
    pub actions: Vec<ActionRecord>,
    /// Reason the plan stopped early after an earlier action went through
    pub aborted: Option<String>,
}

impl DecisionReport {
    /// Nothing was sent to the broker
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions the broker did not execute
    pub fn rejections(&self) -> impl Iterator<Item = &ActionRecord> {
        self.actions.iter().filter(|a| !a.result.success)
    }
}

/// Percentage change between two balances, three decimals
pub fn balance_change_pct(before: Decimal, after: Decimal) -> Option<Decimal> {
    if before.is_zero() {
        return None;
    }
    Some((Decimal::ONE_HUNDRED * (after - before) / before).round_dp(3))
}
