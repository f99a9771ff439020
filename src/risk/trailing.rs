//! Trailing stop-loss state and rule
//!
//! Tracks the most favorable price seen per symbol while a position is
//! open and derives the ratcheted stop from it. The broker calls live in
//! the engine; everything here is synchronous and deterministic.

use super::thresholds::round_price;
use crate::position::{Position, PositionSnapshot, Side};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Per-symbol extremum prices carried across polling ticks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailingStopState {
    max_price: HashMap<String, Decimal>,
    min_price: HashMap<String, Decimal>,
}

/// Outcome of applying the trailing rule to one position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailDecision {
    /// Extremum recorded before this observation
    pub previous_extremum: Decimal,
    /// Extremum to record once the stop is in place
    pub extremum: Decimal,
    /// Stop to submit, when it improves on the current one
    pub new_stop: Option<Decimal>,
}

impl TrailingStopState {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, side: Side) -> &HashMap<String, Decimal> {
        match side {
            Side::Long => &self.max_price,
            Side::Short => &self.min_price,
        }
    }

    fn map_mut(&mut self, side: Side) -> &mut HashMap<String, Decimal> {
        match side {
            Side::Long => &mut self.max_price,
            Side::Short => &mut self.min_price,
        }
    }

    /// Recorded extremum for a symbol on one side
    pub fn extremum(&self, side: Side, symbol: &str) -> Option<Decimal> {
        self.map(side).get(symbol).copied()
    }

    /// Symbols tracked on one side, sorted
    pub fn tracked(&self, side: Side) -> Vec<String> {
        let mut symbols: Vec<String> = self.map(side).keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Start tracking a position, seeding the extremum with its open price
    pub fn observe(&mut self, position: &Position) -> Decimal {
        *self
            .map_mut(position.side)
            .entry(position.symbol.clone())
            .or_insert(position.open_price)
    }

    /// Apply the trailing rule for one position at `reference` and record
    /// the resulting extremum
    pub fn trail(&mut self, position: &Position, reference: Decimal, digits: u32) -> TrailDecision {
        let decision = self.propose(position, reference, digits);
        self.commit(position, &decision);
        decision
    }

    /// Apply the trailing rule without recording the new extremum
    ///
    /// The stop moves by however much the distance from stop to price
    /// exceeds the distance from stop to the recorded extremum. `digits` is
    /// the instrument precision used to round the proposed stop.
    ///
    /// With a stop set, the extremum advances by exactly the distance the
    /// stop moves, so the stop-to-extremum gap stays fixed and a move lost
    /// to rounding carries over to the next tick. Without a stop the
    /// extremum follows the reference price.
    pub fn propose(&mut self, position: &Position, reference: Decimal, digits: u32) -> TrailDecision {
        let previous = self.observe(position);
        let new_stop = position
            .stop_loss
            .and_then(|stop| trailed_stop(position.side, stop, previous, reference, digits));

        let extremum = match (position.stop_loss, new_stop) {
            (Some(stop), Some(new_stop)) => previous + (new_stop - stop),
            (Some(_), None) => previous,
            (None, _) => match position.side {
                Side::Long => previous.max(reference),
                Side::Short => previous.min(reference),
            },
        };

        TrailDecision {
            previous_extremum: previous,
            extremum,
            new_stop,
        }
    }

    /// Record the extremum of a proposal once its stop is in place
    ///
    /// Never moves the extremum against the position.
    pub fn commit(&mut self, position: &Position, decision: &TrailDecision) {
        let entry = self
            .map_mut(position.side)
            .entry(position.symbol.clone())
            .or_insert(decision.extremum);
        *entry = match position.side {
            Side::Long => (*entry).max(decision.extremum),
            Side::Short => (*entry).min(decision.extremum),
        };
    }

    /// Drop extremum entries whose symbol has no open position on that side
    ///
    /// Returns the number of entries removed.
    pub fn reconcile(&mut self, snapshot: &PositionSnapshot) -> usize {
        let mut removed = 0;
        for side in [Side::Long, Side::Short] {
            let open = snapshot.symbols(side);
            let map = self.map_mut(side);
            let before = map.len();
            if open.is_empty() {
                map.clear();
            } else {
                map.retain(|symbol, _| open.contains(symbol.as_str()));
            }
            removed += before - map.len();
        }
        removed
    }
}

/// New stop for a position, or `None` when the stop should stay put
pub fn trailed_stop(
    side: Side,
    stop: Decimal,
    extremum: Decimal,
    reference: Decimal,
    digits: u32,
) -> Option<Decimal> {
    let (to_current, to_extremum) = match side {
        Side::Long => (reference - stop, extremum - stop),
        Side::Short => (stop - reference, stop - extremum),
    };
    if to_current <= to_extremum {
        return None;
    }
    let difference = to_current - to_extremum;
    let candidate = match side {
        Side::Long => round_price(stop + difference, digits),
        Side::Short => round_price(stop - difference, digits),
    };
    let improves = match side {
        Side::Long => candidate > stop,
        Side::Short => candidate < stop,
    };
    improves.then_some(candidate)
}
