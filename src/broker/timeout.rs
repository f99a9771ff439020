//! Per-call time budget for broker calls

use super::{AccountInfo, Broker, BrokerPosition, OrderRequest, OrderResult, Quote, SymbolInfo};
use crate::error::{EngineError, Result};
use crate::telemetry::{record_latency, LatencyMetric};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wraps a broker so that no single call can stall the control loop
pub struct TimeoutBroker {
    inner: Arc<dyn Broker>,
    timeout: Duration,
}

impl TimeoutBroker {
    pub fn new(inner: Arc<dyn Broker>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, call: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, fut).await;
        record_latency(LatencyMetric::BrokerCall, started.elapsed());
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(call, timeout_ms = self.timeout.as_millis() as u64, "Broker call timed out");
                Err(EngineError::Connectivity(format!(
                    "{call} timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl Broker for TimeoutBroker {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.bounded("quote", self.inner.quote(symbol)).await
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        self.bounded("account_info", self.inner.account_info()).await
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        self.bounded("symbol_info", self.inner.symbol_info(symbol))
            .await
    }

    async fn open_positions(&self) -> Result<Vec<BrokerPosition>> {
        self.bounded("open_positions", self.inner.open_positions())
            .await
    }

    async fn validate_order(&self, request: &OrderRequest) -> Result<bool> {
        self.bounded("validate_order", self.inner.validate_order(request))
            .await
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        self.bounded("submit_order", self.inner.submit_order(request))
            .await
    }
}
