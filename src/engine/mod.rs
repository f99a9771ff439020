//! Position & risk control engine
//!
//! Entry points for the caller's polling loop:
//! - [`RiskEngine::run_decision`]: open/close/hold one symbol toward an intent
//! - [`RiskEngine::run_trailing_stop_tick`]: ratchet stops on every open position
//!
//! Business outcomes (no-ops, broker rejections) come back inside the
//! reports. Errors are reserved for connectivity and unusable data.

mod decision;
mod locks;

pub use decision::{
    balance_change_pct, plan, Action, ActionRecord, DecisionReport, DecisionRequest, Intent,
};
pub use locks::SymbolLocks;

use crate::broker::{Broker, OrderResult};
use crate::config::{ExecutionConfig, ReversalPolicy};
use crate::error::Result;
use crate::execution::{ExecutionSubmitter, FillingModeProber, OrderSettings};
use crate::position::{read_snapshot, Position, PositionSnapshot, PositionState, Side};
use crate::risk::TrailingStopState;
use crate::telemetry::{record_latency, set_gauge, GaugeMetric, LatencyMetric};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::Instrument;

/// A stop-loss modification issued by the trailing pass
#[derive(Debug, Clone, Serialize)]
pub struct StopAdjustment {
    pub ticket: u64,
    pub symbol: String,
    pub side: Side,
    pub reference_price: Decimal,
    pub previous_stop: Decimal,
    pub new_stop: Decimal,
    pub accepted: bool,
    pub comment: String,
}

/// Outcome of one trailing-stop pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrailingTickReport {
    pub started_at: DateTime<Utc>,
    /// Positions in the snapshot
    pub positions: usize,
    pub adjustments: Vec<StopAdjustment>,
    /// Positions skipped because of a per-position error
    pub failures: usize,
    /// Modifications dropped because the position changed under the pass
    pub superseded: usize,
    /// Extremum entries dropped by reconciliation
    pub pruned: usize,
}

/// Drives decisions and trailing stops against one broker
pub struct RiskEngine {
    broker: Arc<dyn Broker>,
    submitter: ExecutionSubmitter,
    locks: SymbolLocks,
    trailing: Mutex<TrailingStopState>,
    reversal: ReversalPolicy,
}

impl RiskEngine {
    /// Create an engine with empty trailing state
    pub fn new(broker: Arc<dyn Broker>, config: &ExecutionConfig) -> Self {
        let prober = FillingModeProber::new(broker.clone(), config.filling_modes.clone());
        let submitter =
            ExecutionSubmitter::new(broker.clone(), prober, OrderSettings::from_config(config));
        Self {
            broker,
            submitter,
            locks: SymbolLocks::new(),
            trailing: Mutex::new(TrailingStopState::new()),
            reversal: config.reversal,
        }
    }

    /// Resume with trailing state carried over from a previous engine
    pub fn with_trailing_state(self, state: TrailingStopState) -> Self {
        Self {
            trailing: Mutex::new(state),
            ..self
        }
    }

    /// Current open positions
    pub async fn snapshot(&self) -> Result<PositionSnapshot> {
        read_snapshot(self.broker.as_ref()).await
    }

    /// Copy of the extremum state
    pub async fn trailing_state(&self) -> TrailingStopState {
        self.trailing.lock().await.clone()
    }

    /// Move one symbol toward the requested intent
    pub async fn run_decision(&self, request: &DecisionRequest) -> Result<DecisionReport> {
        let span = tracing::info_span!("decision", symbol = %request.symbol);
        let started = Instant::now();
        let report = self.decide(request).instrument(span).await;
        record_latency(LatencyMetric::Decision, started.elapsed());
        report
    }

    async fn decide(&self, request: &DecisionRequest) -> Result<DecisionReport> {
        let _guard = self.locks.acquire(&request.symbol).await;

        let snapshot = self.snapshot().await?;
        let state = PositionState::from_position(snapshot.for_symbol(&request.symbol));
        tracing::info!(
            state = state.label(),
            ticket = ?state.position().map(|p| p.ticket),
            want_buy = request.intent.want_buy,
            want_sell = request.intent.want_sell,
            "Evaluating position"
        );

        let mut report = DecisionReport {
            symbol: request.symbol.clone(),
            decided_at: Utc::now(),
            prior_state: state.label(),
            actions: vec![],
            aborted: None,
        };

        if request.intent.is_contradictory() {
            tracing::warn!("Buy and sell both requested, holding");
            return Ok(report);
        }

        for action in plan(&state, request.intent, self.reversal) {
            let balance_before = self.balance().await;
            let outcome = match action {
                Action::Open { side } => {
                    self.submitter
                        .open(&request.symbol, side, request.volume, request.risk_reward)
                        .await
                }
                Action::Close {
                    side,
                    ticket,
                    volume,
                } => {
                    self.submitter
                        .close(&request.symbol, side, volume, ticket)
                        .await
                }
            };

            let result = match outcome {
                Ok(result) => result,
                Err(e) if report.actions.is_empty() => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, ?action, "Action failed after earlier step went through");
                    report.aborted = Some(e.to_string());
                    break;
                }
            };

            let balance_after = self.balance().await;
            let record = ActionRecord {
                action,
                balance_change_pct: balance_before
                    .zip(balance_after)
                    .and_then(|(before, after)| balance_change_pct(before, after)),
                result,
                balance_before,
                balance_after,
            };
            log_action(&request.symbol, &record);

            let executed = record.result.success;
            report.actions.push(record);
            if !executed {
                break;
            }
        }

        if report.is_noop() {
            tracing::info!(state = report.prior_state, "No action");
        }
        Ok(report)
    }

    async fn balance(&self) -> Option<Decimal> {
        match self.broker.account_info().await {
            Ok(account) => {
                if let Some(balance) = account.balance.to_f64() {
                    set_gauge(GaugeMetric::Balance, balance);
                }
                Some(account.balance)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Balance unavailable");
                None
            }
        }
    }

    /// Ratchet stop-losses of all open positions, then prune stale extrema
    pub async fn run_trailing_stop_tick(&self) -> Result<TrailingTickReport> {
        let started = Instant::now();
        // Held for the whole pass so overlapping ticks reconcile in order
        let mut state = self.trailing.lock().await;
        let snapshot = self.snapshot().await?;

        let mut report = TrailingTickReport {
            started_at: Utc::now(),
            positions: snapshot.len(),
            ..Default::default()
        };

        for position in snapshot.positions() {
            let span = tracing::debug_span!(
                "trail",
                symbol = %position.symbol,
                ticket = position.ticket
            );
            match self
                .trail_position(&mut state, position)
                .instrument(span)
                .await
            {
                Ok(TrailOutcome::Adjusted(adjustment)) => report.adjustments.push(adjustment),
                Ok(TrailOutcome::Unchanged) => {}
                Ok(TrailOutcome::Superseded) => report.superseded += 1,
                Err(e) => {
                    tracing::warn!(
                        symbol = %position.symbol,
                        ticket = position.ticket,
                        error = %e,
                        "Trailing stop skipped for position"
                    );
                    report.failures += 1;
                }
            }
        }

        report.pruned = state.reconcile(&snapshot);
        if report.pruned > 0 {
            tracing::debug!(pruned = report.pruned, "Dropped extrema of closed positions");
        }

        set_gauge(GaugeMetric::OpenPositions, snapshot.len() as f64);
        set_gauge(
            GaugeMetric::TrackedExtrema,
            (state.tracked(Side::Long).len() + state.tracked(Side::Short).len()) as f64,
        );
        record_latency(LatencyMetric::TrailingTick, started.elapsed());
        Ok(report)
    }

    async fn trail_position(
        &self,
        state: &mut TrailingStopState,
        position: &Position,
    ) -> Result<TrailOutcome> {
        // Track before any broker call so a failed lookup still leaves an entry
        state.observe(position);

        let quote = self.broker.quote(&position.symbol).await?;
        let info = self.broker.symbol_info(&position.symbol).await?;
        let reference = quote.mid();
        let decision = state.propose(position, reference, info.price_precision);

        let (Some(previous_stop), Some(new_stop)) = (position.stop_loss, decision.new_stop) else {
            state.commit(position, &decision);
            return Ok(TrailOutcome::Unchanged);
        };

        let _guard = self.locks.acquire(&position.symbol).await;
        if !self.still_open(position).await? {
            tracing::debug!(%new_stop, "Position closed or stop moved since the snapshot, not modifying");
            return Ok(TrailOutcome::Superseded);
        }

        let result = self.submitter.modify_stop_loss(position, new_stop).await?;
        log_stop_result(position, previous_stop, new_stop, &result);
        if result.success {
            state.commit(position, &decision);
        }

        Ok(TrailOutcome::Adjusted(StopAdjustment {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            side: position.side,
            reference_price: reference,
            previous_stop,
            new_stop,
            accepted: result.success,
            comment: result.comment,
        }))
    }

    /// The ticket is still open with the stop the snapshot saw
    async fn still_open(&self, position: &Position) -> Result<bool> {
        let live = self.broker.open_positions().await?;
        let expected_stop = position.stop_loss.unwrap_or_default();
        Ok(live
            .iter()
            .any(|p| p.ticket == position.ticket && p.stop_loss == expected_stop))
    }
}

enum TrailOutcome {
    Unchanged,
    /// A decision closed the position or moved its stop first
    Superseded,
    Adjusted(StopAdjustment),
}

fn log_action(symbol: &str, record: &ActionRecord) {
    let (kind, side) = match record.action {
        Action::Open { side } => ("open", side),
        Action::Close { side, .. } => ("close", side),
    };
    tracing::info!(
        symbol,
        kind,
        %side,
        comment = %record.result.comment,
        balance_before = ?record.balance_before,
        balance_after = ?record.balance_after,
        balance_change_pct = ?record.balance_change_pct,
        "Order acknowledged"
    );
    if let Err(e) = record.result.ensure_success(symbol) {
        tracing::warn!(kind, %side, error = %e, "Order not executed");
    }
}

fn log_stop_result(position: &Position, previous: Decimal, new_stop: Decimal, result: &OrderResult) {
    match result.ensure_success(&position.symbol) {
        Ok(()) => tracing::info!(
            symbol = %position.symbol,
            ticket = position.ticket,
            side = %position.side,
            %previous,
            %new_stop,
            "Stop-loss trailed"
        ),
        Err(e) => tracing::warn!(
            symbol = %position.symbol,
            ticket = position.ticket,
            %new_stop,
            error = %e,
            "Stop-loss modification not executed"
        ),
    }
}
