//! CLI interface for risk-engine
//!
//! Provides subcommands for:
//! - `run`: Trailing-stop polling loop
//! - `decide`: One open/close/hold decision for a symbol
//! - `positions`: Show open positions
//! - `config`: Show effective configuration

mod decide;
mod run;

pub use decide::DecideArgs;
pub use run::RunArgs;

use crate::broker::{
    AccountInfo, Broker, GatewayBroker, GatewayConfig, PaperBroker, Quote, SymbolInfo,
    TimeoutBroker,
};
use crate::config::{BrokerMode, Config};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "risk-engine")]
#[command(about = "Position and risk control engine for margin-trading accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the trailing-stop polling loop
    Run(RunArgs),
    /// Open, close or hold one symbol
    Decide(DecideArgs),
    /// Show open positions
    Positions,
    /// Show effective configuration
    Config,
}

/// Build the configured broker, bounded by the per-call timeout
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn Broker>> {
    let inner: Arc<dyn Broker> = match config.broker.mode {
        BrokerMode::Paper => Arc::new(paper_broker(config).await),
        BrokerMode::Live => Arc::new(GatewayBroker::with_config(GatewayConfig {
            base_url: config.broker.gateway_url.clone(),
            timeout: config.call_timeout(),
        })?),
    };
    tracing::info!(mode = ?config.broker.mode, "Broker configured");
    Ok(Arc::new(TimeoutBroker::new(inner, config.call_timeout())))
}

async fn paper_broker(config: &Config) -> PaperBroker {
    let broker = PaperBroker::new(AccountInfo {
        balance: config.paper.balance,
        leverage: config.paper.leverage,
    });
    let broker = match &config.paper.ledger_path {
        Some(path) => broker.with_ledger(path),
        None => broker,
    };
    for instrument in &config.paper.instruments {
        broker
            .add_instrument(
                &instrument.symbol,
                SymbolInfo {
                    price_precision: instrument.price_precision,
                    contract_size: instrument.contract_size,
                    volume_min: instrument.volume_min,
                    point: instrument.point,
                },
                Quote {
                    bid: instrument.bid,
                    ask: instrument.ask,
                },
            )
            .await;
    }
    broker
}
