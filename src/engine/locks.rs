//! Per-symbol mutual exclusion for broker-mutating calls

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async lock per symbol, created on first use
#[derive(Debug, Default)]
pub struct SymbolLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SymbolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a symbol
    pub async fn acquire(&self, symbol: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(symbol.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
