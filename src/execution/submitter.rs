//! Order construction and submission
//!
//! None of these calls are idempotent: a retried open can create a second
//! position. Nothing here retries; the next polling tick re-reads the truth.

use super::FillingModeProber;
use crate::broker::{Broker, OrderAction, OrderRequest, OrderResult};
use crate::config::ExecutionConfig;
use crate::error::{EngineError, Result};
use crate::position::{Position, Side};
use crate::risk::{compute_thresholds, round_price, RiskReward, Thresholds};
use crate::telemetry::{record_order, OrderKind};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Fields stamped on every order
#[derive(Debug, Clone)]
pub struct OrderSettings {
    /// Accepted slippage in points
    pub deviation: u32,
    /// Strategy identifier attached to orders
    pub magic: u64,
    /// Free-text order comment
    pub comment: String,
}

impl OrderSettings {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            deviation: config.deviation,
            magic: config.magic,
            comment: config.comment.clone(),
        }
    }
}

/// Builds open/close/modify requests and sends them to the broker
pub struct ExecutionSubmitter {
    broker: Arc<dyn Broker>,
    prober: FillingModeProber,
    settings: OrderSettings,
}

impl ExecutionSubmitter {
    pub fn new(broker: Arc<dyn Broker>, prober: FillingModeProber, settings: OrderSettings) -> Self {
        Self {
            broker,
            prober,
            settings,
        }
    }

    /// Open a market position with take-profit and stop-loss attached
    pub async fn open(
        &self,
        symbol: &str,
        side: Side,
        volume: Decimal,
        risk_reward: RiskReward,
    ) -> Result<OrderResult> {
        ensure_volume(volume)?;
        let quote = self.broker.quote(symbol).await?;
        let info = self.broker.symbol_info(symbol).await?;
        let account = self.broker.account_info().await?;

        let raw_price = match side {
            Side::Long => quote.ask,
            Side::Short => quote.bid,
        };
        let price = round_price(raw_price, info.price_precision);
        let Thresholds {
            take_profit,
            stop_loss,
        } = compute_thresholds(side, price, Decimal::from(account.leverage), risk_reward)
            .map_err(|e| match e {
                EngineError::InvalidInstrumentState(reason) => {
                    EngineError::InvalidInstrumentState(format!("{symbol}: {reason}"))
                }
                other => other,
            })?;
        let filling = self.prober.probe(symbol).await?;

        let request = OrderRequest {
            action: OrderAction::Deal,
            symbol: symbol.to_string(),
            volume,
            order_type: side.entry_order(),
            price,
            deviation: self.settings.deviation,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            position: None,
            magic: self.settings.magic,
            comment: self.settings.comment.clone(),
            filling: Some(filling),
        };

        tracing::debug!(
            symbol,
            %side,
            %volume,
            %price,
            %take_profit,
            %stop_loss,
            ?filling,
            "Submitting open order"
        );
        let result = self.broker.submit_order(&request).await?;
        record_order(OrderKind::Open, result.success);
        Ok(result)
    }

    /// Unwind an open position with an opposite market order
    pub async fn close(
        &self,
        symbol: &str,
        side: Side,
        volume: Decimal,
        ticket: u64,
    ) -> Result<OrderResult> {
        ensure_volume(volume)?;
        let quote = self.broker.quote(symbol).await?;
        let price = match side {
            Side::Long => quote.bid,
            Side::Short => quote.ask,
        };
        let filling = self.prober.probe(symbol).await?;

        let request = OrderRequest {
            action: OrderAction::Deal,
            symbol: symbol.to_string(),
            volume,
            order_type: side.exit_order(),
            price,
            deviation: self.settings.deviation,
            stop_loss: None,
            take_profit: None,
            position: Some(ticket),
            magic: self.settings.magic,
            comment: self.settings.comment.clone(),
            filling: Some(filling),
        };

        tracing::debug!(symbol, %side, ticket, %volume, %price, "Submitting close order");
        let result = self.broker.submit_order(&request).await?;
        record_order(OrderKind::Close, result.success);
        Ok(result)
    }

    /// Move the stop-loss of an open position, leaving its take-profit as is
    pub async fn modify_stop_loss(
        &self,
        position: &Position,
        new_stop_loss: Decimal,
    ) -> Result<OrderResult> {
        let request = OrderRequest {
            action: OrderAction::ModifyStops,
            symbol: position.symbol.clone(),
            volume: position.volume,
            order_type: position.side.entry_order(),
            price: position.open_price,
            deviation: self.settings.deviation,
            stop_loss: Some(new_stop_loss),
            take_profit: position.take_profit,
            position: Some(position.ticket),
            magic: self.settings.magic,
            comment: self.settings.comment.clone(),
            filling: self.prober.cached(&position.symbol).await,
        };

        tracing::debug!(
            symbol = %position.symbol,
            ticket = position.ticket,
            old_stop = ?position.stop_loss,
            %new_stop_loss,
            "Submitting stop-loss modification"
        );
        let result = self.broker.submit_order(&request).await?;
        record_order(OrderKind::ModifyStop, result.success);
        Ok(result)
    }
}

fn ensure_volume(volume: Decimal) -> Result<()> {
    if volume <= Decimal::ZERO {
        return Err(EngineError::InvalidRiskParameters(format!(
            "volume must be positive, got {volume}"
        )));
    }
    Ok(())
}
