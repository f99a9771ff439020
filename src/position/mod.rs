//! Position module
//!
//! Position records, the three-state per-symbol view, and the snapshot reader

mod snapshot;
mod types;

pub use snapshot::{normalize, read_snapshot, PositionSnapshot};
pub use types::{Position, PositionState, Side};
