//! HTTP client for a trading-terminal gateway
//!
//! The gateway is a small bridge process sitting next to the terminal and
//! exposing its account, symbol, position and order calls as JSON over HTTP.

use super::{AccountInfo, Broker, BrokerPosition, OrderRequest, OrderResult, Quote, SymbolInfo};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Default gateway address
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8228";

/// Configuration for the gateway client
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway
    pub base_url: String,
    /// Transport-level request timeout
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Broker backed by the terminal gateway
pub struct GatewayBroker {
    config: GatewayConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    comment: String,
}

impl GatewayBroker {
    /// Create a gateway client with custom configuration
    pub fn with_config(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        tracing::trace!(url = %url, "Gateway GET");
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, request: &OrderRequest) -> Result<T> {
        let url = self.url(path);
        tracing::trace!(url = %url, symbol = %request.symbol, "Gateway POST");
        let response = self.client.post(&url).json(request).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EngineError::Connectivity(format!(
            "gateway error: {status} - {body}"
        )));
    }
    let body = response.bytes().await?;
    parse(&body)
}

/// Decode a gateway payload; a malformed body is bad data, not a dead link
fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        EngineError::InvalidInstrumentState(format!("malformed gateway payload: {e}"))
    })
}

#[async_trait]
impl Broker for GatewayBroker {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.get(&format!("quote/{symbol}")).await
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        self.get("account").await
    }

    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        self.get(&format!("symbols/{symbol}")).await
    }

    async fn open_positions(&self) -> Result<Vec<BrokerPosition>> {
        self.get("positions").await
    }

    async fn validate_order(&self, request: &OrderRequest) -> Result<bool> {
        let check: CheckResponse = self.post("orders/check", request).await?;
        Ok(check.comment == super::COMMENT_CHECK_DONE)
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        self.post("orders", request).await
    }
}
