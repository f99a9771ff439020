//! Decide command implementation

use crate::config::Config;
use crate::engine::{DecisionRequest, Intent, RiskEngine};
use crate::risk::RiskReward;
use clap::{ArgGroup, Args};
use rust_decimal::Decimal;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("intent").required(true).args(["buy", "sell", "flat"])))]
pub struct DecideArgs {
    /// Instrument to act on
    #[arg(short, long)]
    pub symbol: String,
    /// Want a long position
    #[arg(long)]
    pub buy: bool,
    /// Want a short position
    #[arg(long)]
    pub sell: bool,
    /// Want neither (holds any open position)
    #[arg(long)]
    pub flat: bool,
    /// Lot size, defaults to the symbol's configured volume
    #[arg(long)]
    pub volume: Option<Decimal>,
    /// Risk fraction, defaults to the symbol's configured risk
    #[arg(long)]
    pub risk: Option<Decimal>,
    /// Reward fraction, defaults to the symbol's configured reward
    #[arg(long)]
    pub reward: Option<Decimal>,
}

impl DecideArgs {
    /// Merge flags with the symbol's configured defaults
    pub fn request(&self, config: &Config) -> anyhow::Result<DecisionRequest> {
        let defaults = config.symbol(&self.symbol);
        let volume = self
            .volume
            .or(defaults.map(|d| d.volume))
            .ok_or_else(|| anyhow::anyhow!("no volume given or configured for {}", self.symbol))?;
        let fallback = RiskReward::default();
        let risk_reward = RiskReward {
            risk: self
                .risk
                .or(defaults.map(|d| d.risk))
                .unwrap_or(fallback.risk),
            reward: self
                .reward
                .or(defaults.map(|d| d.reward))
                .unwrap_or(fallback.reward),
        };

        Ok(DecisionRequest {
            symbol: self.symbol.clone(),
            intent: Intent {
                want_buy: self.buy,
                want_sell: self.sell,
            },
            volume,
            risk_reward,
        })
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let request = self.request(config)?;
        let broker = super::connect(config).await?;
        let engine = RiskEngine::new(broker, &config.execution);

        let report = engine.run_decision(&request).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
