//! Position types

use crate::broker::OrderType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Betting on a price increase
    Long,
    /// Betting on a price decrease
    Short,
}

impl Side {
    /// The other direction
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Market order type that opens a position on this side
    pub fn entry_order(self) -> OrderType {
        match self {
            Side::Long => OrderType::Buy,
            Side::Short => OrderType::Sell,
        }
    }

    /// Market order type that unwinds a position on this side
    pub fn exit_order(self) -> OrderType {
        self.opposite().entry_order()
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// An open position as seen in the latest snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Broker-assigned identifier
    pub ticket: u64,
    /// Position direction
    pub side: Side,
    /// Instrument identifier
    pub symbol: String,
    /// Lot size
    pub volume: Decimal,
    /// Fill price at open
    pub open_price: Decimal,
    /// Protective stop, absent when the broker reports none
    pub stop_loss: Option<Decimal>,
    /// Profit target, absent when the broker reports none
    pub take_profit: Option<Decimal>,
    /// Floating profit in account currency
    pub profit: Decimal,
    /// `profit / (open_price * contract_size * volume)`, absent when unknown
    pub profit_pct: Option<Decimal>,
}

/// Position existence for one symbol
#[derive(Debug, Clone, PartialEq)]
pub enum PositionState {
    NoPosition,
    Long(Position),
    Short(Position),
}

impl PositionState {
    /// Build the state from the position currently open on a symbol
    pub fn from_position(position: Option<&Position>) -> Self {
        match position {
            None => PositionState::NoPosition,
            Some(p) => match p.side {
                Side::Long => PositionState::Long(p.clone()),
                Side::Short => PositionState::Short(p.clone()),
            },
        }
    }

    /// The open position, if any
    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::NoPosition => None,
            PositionState::Long(p) | PositionState::Short(p) => Some(p),
        }
    }

    /// Short label for logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            PositionState::NoPosition => "none",
            PositionState::Long(_) => "long",
            PositionState::Short(_) => "short",
        }
    }
}
