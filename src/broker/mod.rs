//! Broker module
//!
//! The collaborator interface the engine drives, plus a paper venue,
//! an HTTP gateway client and a per-call timeout decorator

mod gateway;
mod paper;
mod timeout;
mod types;

pub use gateway::{GatewayBroker, GatewayConfig};
pub use paper::PaperBroker;
pub use timeout::TimeoutBroker;
pub use types::{
    AccountInfo, BrokerPosition, FillingMode, OrderAction, OrderRequest, OrderResult, OrderType,
    Quote, SymbolInfo, COMMENT_CHECK_DONE, COMMENT_EXECUTED,
};

use crate::error::Result;
use async_trait::async_trait;

/// Trait for broker/terminal implementations
#[async_trait]
pub trait Broker: Send + Sync {
    /// Current bid/ask for a symbol
    async fn quote(&self, symbol: &str) -> Result<Quote>;
    /// Account balance and leverage
    async fn account_info(&self) -> Result<AccountInfo>;
    /// Instrument metadata
    async fn symbol_info(&self, symbol: &str) -> Result<SymbolInfo>;
    /// All open positions on the account
    async fn open_positions(&self) -> Result<Vec<BrokerPosition>>;
    /// Dry-run check of a request; `true` when the venue would accept it
    async fn validate_order(&self, request: &OrderRequest) -> Result<bool>;
    /// Submit a request for execution
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderResult>;
}
