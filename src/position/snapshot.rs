//! Position snapshot reader
//!
//! Reads every open position from the broker and normalizes it into
//! [`Position`] records. Contract-size lookups are best effort: a failed
//! lookup leaves `profit_pct` empty for the affected positions only.

use super::{Position, Side};
use crate::broker::{Broker, BrokerPosition};
use crate::error::Result;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// Ordered view of all open positions at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSnapshot {
    positions: Vec<Position>,
}

impl PositionSnapshot {
    /// Wrap already-normalized positions
    pub fn new(positions: Vec<Position>) -> Self {
        Self { positions }
    }

    /// All positions, in broker order
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// First open position on a symbol
    pub fn for_symbol(&self, symbol: &str) -> Option<&Position> {
        let mut matching = self.positions.iter().filter(|p| p.symbol == symbol);
        let first = matching.next();
        if first.is_some() && matching.next().is_some() {
            tracing::warn!(symbol, "Multiple open positions on one symbol, using the first");
        }
        first
    }

    /// Symbols with an open position on the given side
    pub fn symbols(&self, side: Side) -> HashSet<&str> {
        self.positions
            .iter()
            .filter(|p| p.side == side)
            .map(|p| p.symbol.as_str())
            .collect()
    }
}

/// Query the broker and build a snapshot
pub async fn read_snapshot(broker: &dyn Broker) -> Result<PositionSnapshot> {
    let raw = broker.open_positions().await?;
    let mut contract_sizes: HashMap<String, Option<Decimal>> = HashMap::new();
    let mut positions = Vec::with_capacity(raw.len());

    for entry in raw {
        let contract_size = match contract_sizes.get(&entry.symbol) {
            Some(size) => *size,
            None => {
                let size = match broker.symbol_info(&entry.symbol).await {
                    Ok(info) => Some(info.contract_size),
                    Err(e) => {
                        tracing::warn!(
                            symbol = %entry.symbol,
                            ticket = entry.ticket,
                            error = %e,
                            "Contract size lookup failed, profit percentage unavailable"
                        );
                        None
                    }
                };
                contract_sizes.insert(entry.symbol.clone(), size);
                size
            }
        };
        positions.push(normalize(entry, contract_size));
    }

    tracing::debug!(open_positions = positions.len(), "Position snapshot read");
    Ok(PositionSnapshot::new(positions))
}

/// Convert a broker record, deriving the profit percentage
pub fn normalize(raw: BrokerPosition, contract_size: Option<Decimal>) -> Position {
    let profit_pct = contract_size.and_then(|size| profit_pct(&raw, size));
    Position {
        ticket: raw.ticket,
        side: raw.side,
        symbol: raw.symbol,
        volume: raw.volume,
        open_price: raw.open_price,
        stop_loss: non_zero(raw.stop_loss),
        take_profit: non_zero(raw.take_profit),
        profit: raw.profit,
        profit_pct,
    }
}

fn profit_pct(raw: &BrokerPosition, contract_size: Decimal) -> Option<Decimal> {
    let notional = raw
        .open_price
        .checked_mul(contract_size)?
        .checked_mul(raw.volume)?;
    raw.profit.checked_div(notional)
}

// Brokers report an unset stop or target as zero.
fn non_zero(price: Decimal) -> Option<Decimal> {
    (!price.is_zero()).then_some(price)
}
