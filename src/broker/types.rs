//! Broker-facing types

use crate::position::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Comment attached by the venue to an executed order
pub const COMMENT_EXECUTED: &str = "Request executed";
/// Comment attached by the venue to a passing order check
pub const COMMENT_CHECK_DONE: &str = "Done";

/// Current top of book for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Quote {
    /// Midpoint of bid and ask
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// Account-level data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account balance in account currency
    pub balance: Decimal,
    /// Margin leverage (e.g. 100 for 1:100)
    pub leverage: u32,
}

/// Instrument metadata
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Number of decimals quoted by the venue
    pub price_precision: u32,
    /// Units of the underlying per lot
    pub contract_size: Decimal,
    /// Minimum tradeable volume in lots
    pub volume_min: Decimal,
    /// Smallest price increment
    pub point: Decimal,
}

/// An open position as reported by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub ticket: u64,
    pub symbol: String,
    pub side: Side,
    pub volume: Decimal,
    pub open_price: Decimal,
    /// Zero when no stop is set
    pub stop_loss: Decimal,
    /// Zero when no target is set
    pub take_profit: Decimal,
    pub profit: Decimal,
}

/// Venue policy for partial or immediate fulfillment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillingMode {
    /// Fill the whole volume or cancel
    #[serde(rename = "fok")]
    FillOrKill,
    /// Fill what is available now, cancel the rest
    #[serde(rename = "ioc")]
    ImmediateOrCancel,
    /// Fill what is available now, keep the rest working
    #[serde(rename = "return")]
    Return,
}

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Buy,
    Sell,
}

/// What an order request asks the venue to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    /// Immediate market execution
    Deal,
    /// Change stop-loss / take-profit of an open position
    ModifyStops,
}

/// A request sent to the venue, either for validation or execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub action: OrderAction,
    pub symbol: String,
    pub volume: Decimal,
    pub order_type: OrderType,
    pub price: Decimal,
    /// Accepted slippage in points
    pub deviation: u32,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Ticket of the position this request acts on
    pub position: Option<u64>,
    pub magic: u64,
    pub comment: String,
    pub filling: Option<FillingMode>,
}

/// Broker acknowledgment of a submitted request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    #[serde(default)]
    pub retcode: Option<u32>,
    pub comment: String,
    /// Ticket of the resulting position or deal
    #[serde(default)]
    pub ticket: Option<u64>,
    /// Execution price
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl OrderResult {
    /// Convert a non-success acknowledgment into an error
    pub fn ensure_success(&self, symbol: &str) -> crate::error::Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(crate::error::EngineError::OrderRejected {
                symbol: symbol.to_string(),
                comment: self.comment.clone(),
            })
        }
    }
}
