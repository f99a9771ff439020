//! Filling-mode probing
//!
//! Venues accept only some filling policies per symbol. The prober finds
//! the first accepted candidate with dry-run order checks and remembers it
//! for the rest of the process run.

use crate::broker::{Broker, FillingMode, OrderAction, OrderRequest, OrderType};
use crate::error::{EngineError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Candidates tried when none are configured
pub const DEFAULT_CANDIDATES: [FillingMode; 3] = [
    FillingMode::FillOrKill,
    FillingMode::ImmediateOrCancel,
    FillingMode::Return,
];

/// Finds and caches the accepted filling mode per symbol
pub struct FillingModeProber {
    broker: Arc<dyn Broker>,
    candidates: Vec<FillingMode>,
    cache: RwLock<HashMap<String, FillingMode>>,
}

impl FillingModeProber {
    pub fn new(broker: Arc<dyn Broker>, candidates: Vec<FillingMode>) -> Self {
        let candidates = if candidates.is_empty() {
            DEFAULT_CANDIDATES.to_vec()
        } else {
            candidates
        };
        Self {
            broker,
            candidates,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Previously probed mode for a symbol
    pub async fn cached(&self, symbol: &str) -> Option<FillingMode> {
        self.cache.read().await.get(symbol).copied()
    }

    /// Accepted filling mode for a symbol
    pub async fn probe(&self, symbol: &str) -> Result<FillingMode> {
        if let Some(mode) = self.cached(symbol).await {
            return Ok(mode);
        }

        let info = self.broker.symbol_info(symbol).await?;
        let quote = self.broker.quote(symbol).await?;

        for &mode in &self.candidates {
            let request = OrderRequest {
                action: OrderAction::Deal,
                symbol: symbol.to_string(),
                volume: info.volume_min,
                order_type: OrderType::Buy,
                price: quote.ask,
                deviation: 0,
                stop_loss: None,
                take_profit: None,
                position: None,
                magic: 0,
                comment: String::new(),
                filling: Some(mode),
            };
            if self.broker.validate_order(&request).await? {
                tracing::debug!(symbol, ?mode, "Filling mode accepted");
                self.cache.write().await.insert(symbol.to_string(), mode);
                return Ok(mode);
            }
            tracing::debug!(symbol, ?mode, "Filling mode refused");
        }

        tracing::warn!(symbol, candidates = ?self.candidates, "Venue refused every filling mode");
        Err(EngineError::NoAcceptableFillingMode(symbol.to_string()))
    }
}
