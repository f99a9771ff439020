//! Take-profit / stop-loss threshold computation

use crate::error::{EngineError, Result};
use crate::position::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Protective price levels attached to an opening order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

/// Risk and reward as fractions of margin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskReward {
    /// Loss fraction guarded by the stop (e.g. 0.01)
    pub risk: Decimal,
    /// Gain fraction targeted by the take-profit (e.g. 0.02)
    pub reward: Decimal,
}

impl Default for RiskReward {
    fn default() -> Self {
        Self {
            risk: Decimal::new(1, 2),
            reward: Decimal::new(2, 2),
        }
    }
}

/// Compute take-profit and stop-loss for an order at `price`
///
/// Leverage divides the raw fractions, so a 1% risk at 1:100 leverage
/// places the stop 0.01% away from the price. The result carries exactly
/// as many decimals as `price` itself.
pub fn compute_thresholds(
    side: Side,
    price: Decimal,
    leverage: Decimal,
    risk_reward: RiskReward,
) -> Result<Thresholds> {
    if price <= Decimal::ZERO {
        return Err(EngineError::InvalidInstrumentState(format!(
            "price must be positive, got {price}"
        )));
    }
    if leverage <= Decimal::ZERO {
        return Err(EngineError::InvalidInstrumentState(format!(
            "leverage must be positive, got {leverage}"
        )));
    }
    if risk_reward.risk.is_sign_negative() || risk_reward.reward.is_sign_negative() {
        return Err(EngineError::InvalidRiskParameters(format!(
            "risk {} and reward {} must not be negative",
            risk_reward.risk, risk_reward.reward
        )));
    }

    let var_down = risk_reward.risk / leverage * price;
    let var_up = risk_reward.reward / leverage * price;

    let (take_profit, stop_loss) = match side {
        Side::Long => (price + var_up, price - var_down),
        Side::Short => (price - var_up, price + var_down),
    };

    let digits = price.scale();
    Ok(Thresholds {
        take_profit: round_price(take_profit, digits),
        stop_loss: round_price(stop_loss, digits),
    })
}

/// Round half-even to `digits` decimals and pad with trailing zeros
pub fn round_price(price: Decimal, digits: u32) -> Decimal {
    let mut rounded = price.round_dp(digits);
    rounded.rescale(digits);
    rounded
}
