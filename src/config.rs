//! Configuration types for risk-engine

use crate::broker::FillingMode;
use crate::execution::DEFAULT_CANDIDATES;
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub trailing: TrailingConfig,
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Broker connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_mode")]
    pub mode: BrokerMode,
    /// Terminal gateway address, used in live mode
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Time budget for every broker call
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

/// Which broker the engine drives
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerMode {
    Paper,
    Live,
}

fn default_broker_mode() -> BrokerMode {
    BrokerMode::Paper
}
fn default_gateway_url() -> String {
    crate::broker::GatewayConfig::default().base_url
}
fn default_call_timeout_ms() -> u64 {
    5_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mode: default_broker_mode(),
            gateway_url: default_gateway_url(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

/// Order construction and decision configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Accepted slippage in points
    #[serde(default = "default_deviation")]
    pub deviation: u32,
    /// Strategy identifier stamped on orders
    #[serde(default = "default_magic")]
    pub magic: u64,
    #[serde(default = "default_comment")]
    pub comment: String,
    /// How a close followed by an opposite open is scheduled
    #[serde(default)]
    pub reversal: ReversalPolicy,
    /// Filling modes to probe, in order
    #[serde(default = "default_filling_modes")]
    pub filling_modes: Vec<FillingMode>,
}

/// Scheduling of a reversal (close one side, open the other)
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReversalPolicy {
    /// Close this tick; the next tick sees no position and opens
    #[default]
    TwoTick,
    /// Open the opposite side right after a successful close
    SameTick,
}

fn default_deviation() -> u32 {
    10
}
fn default_magic() -> u64 {
    23400
}
fn default_comment() -> String {
    "risk-engine".to_string()
}
fn default_filling_modes() -> Vec<FillingMode> {
    DEFAULT_CANDIDATES.to_vec()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            deviation: default_deviation(),
            magic: default_magic(),
            comment: default_comment(),
            reversal: ReversalPolicy::default(),
            filling_modes: default_filling_modes(),
        }
    }
}

/// Trailing stop loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrailingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between polling ticks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_poll_interval_secs() -> u64 {
    1
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Per-symbol order defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SymbolConfig {
    pub symbol: String,
    /// Lot size for new positions
    pub volume: Decimal,
    /// Risk fraction guarded by the stop-loss
    #[serde(default = "default_risk")]
    pub risk: Decimal,
    /// Reward fraction targeted by the take-profit
    #[serde(default = "default_reward")]
    pub reward: Decimal,
}

fn default_risk() -> Decimal {
    Decimal::new(1, 2) // 0.01
}
fn default_reward() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

/// Paper venue seed data
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperConfig {
    #[serde(default = "default_balance")]
    pub balance: Decimal,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// File holding the account and open positions between runs
    #[serde(default = "default_ledger_path")]
    pub ledger_path: Option<PathBuf>,
    #[serde(default)]
    pub instruments: Vec<PaperInstrumentConfig>,
}

fn default_balance() -> Decimal {
    Decimal::new(10_000, 0)
}
fn default_leverage() -> u32 {
    100
}

fn default_ledger_path() -> Option<PathBuf> {
    Some(PathBuf::from("paper-ledger.json"))
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            balance: default_balance(),
            leverage: default_leverage(),
            ledger_path: default_ledger_path(),
            instruments: vec![],
        }
    }
}

/// One instrument offered by the paper venue
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaperInstrumentConfig {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub price_precision: u32,
    pub contract_size: Decimal,
    pub volume_min: Decimal,
    pub point: Decimal,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus scrape port; metrics are not exported when absent
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the control loop cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.broker.call_timeout_ms == 0 {
            anyhow::bail!("broker.call_timeout_ms must be greater than zero");
        }
        if self.trailing.poll_interval_secs == 0 {
            anyhow::bail!("trailing.poll_interval_secs must be greater than zero");
        }
        for entry in &self.symbols {
            if entry.volume <= Decimal::ZERO {
                anyhow::bail!("symbol {}: volume must be positive", entry.symbol);
            }
            if entry.risk.is_sign_negative() || entry.reward.is_sign_negative() {
                anyhow::bail!("symbol {}: risk and reward must not be negative", entry.symbol);
            }
        }
        Ok(())
    }

    /// Order defaults for a symbol
    pub fn symbol(&self, symbol: &str) -> Option<&SymbolConfig> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.broker.call_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.trailing.poll_interval_secs)
    }
}
