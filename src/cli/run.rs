//! Run command implementation

use crate::config::Config;
use crate::engine::RiskEngine;
use clap::Args;
use tokio::time::MissedTickBehavior;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Stop after this many ticks
    #[arg(long)]
    pub max_ticks: Option<u64>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if !config.trailing.enabled {
            tracing::warn!("Trailing stop disabled in configuration, nothing to run");
            return Ok(());
        }

        let broker = super::connect(config).await?;
        let engine = RiskEngine::new(broker, &config.execution);

        let mut interval = tokio::time::interval(config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        tracing::info!(
            poll_interval_secs = config.trailing.poll_interval_secs,
            "Starting trailing-stop loop"
        );

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(ticks, "Shutdown requested, stopping after current tick");
                    break;
                }
                _ = interval.tick() => {
                    // The tick runs to completion before the shutdown branch is polled again
                    match engine.run_trailing_stop_tick().await {
                        Ok(report) => tracing::debug!(
                            positions = report.positions,
                            adjustments = report.adjustments.len(),
                            failures = report.failures,
                            superseded = report.superseded,
                            pruned = report.pruned,
                            "Trailing tick complete"
                        ),
                        Err(e) => tracing::warn!(error = %e, retryable = e.is_retryable(), "Trailing tick failed"),
                    }
                    ticks += 1;
                    if self.max_ticks.is_some_and(|max| ticks >= max) {
                        break;
                    }
                }
            }
        }

        tracing::info!(ticks, "Trailing-stop loop stopped");
        Ok(())
    }
}
