//! Execution module
//!
//! Filling-mode probing and order submission (open, close, stop modification)

mod filling;
mod submitter;

pub use filling::{FillingModeProber, DEFAULT_CANDIDATES};
pub use submitter::{ExecutionSubmitter, OrderSettings};
