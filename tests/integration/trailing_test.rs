//! Trailing-stop integration tests against the paper venue

mod common;

use async_trait::async_trait;
use risk_engine::broker::{
    AccountInfo, Broker, BrokerPosition, OrderAction, OrderRequest, OrderResult, PaperBroker,
    Quote, SymbolInfo,
};
use risk_engine::config::{ExecutionConfig, ReversalPolicy};
use risk_engine::position::Side;
use risk_engine::risk::{RiskReward, TrailingStopState};
use risk_engine::{DecisionRequest, EngineError, Intent, RiskEngine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, Notify};

async fn set_mid(broker: &PaperBroker, symbol: &str, mid: Decimal) {
    broker
        .set_quote(symbol, mid - dec!(0.00001), mid + dec!(0.00001))
        .await;
}

#[tokio::test]
async fn test_opened_position_trails_and_keeps_take_profit() {
    let broker = common::venue().await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    set_mid(&broker, "EURUSD", dec!(1.09999)).await;
    let report = engine
        .run_decision(&DecisionRequest {
            symbol: "EURUSD".to_string(),
            intent: Intent::buy(),
            volume: dec!(0.10),
            risk_reward: RiskReward::default(),
        })
        .await
        .unwrap();
    let ticket = report.actions[0].result.ticket.unwrap();

    let opened = engine.snapshot().await.unwrap();
    let position = &opened.positions()[0];
    assert_eq!(position.open_price, dec!(1.10000));
    assert_eq!(position.stop_loss, Some(dec!(1.09989)));
    assert_eq!(position.take_profit, Some(dec!(1.10022)));

    set_mid(&broker, "EURUSD", dec!(1.10050)).await;
    let tick = engine.run_trailing_stop_tick().await.unwrap();

    assert_eq!(tick.positions, 1);
    assert_eq!(tick.adjustments.len(), 1);
    let adjustment = &tick.adjustments[0];
    assert!(adjustment.accepted);
    assert_eq!(adjustment.previous_stop, dec!(1.09989));
    assert_eq!(adjustment.new_stop, dec!(1.10039));
    assert_eq!(broker.stop_loss(ticket).await, Some(dec!(1.10039)));

    let after = engine.snapshot().await.unwrap();
    assert_eq!(after.positions()[0].take_profit, Some(dec!(1.10022)));
    assert_eq!(
        engine.trailing_state().await.extremum(Side::Long, "EURUSD"),
        Some(dec!(1.10050))
    );
}

#[tokio::test]
async fn test_long_stop_is_monotonic_across_ticks() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(1, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09989)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let mut last = dec!(1.09989);
    for mid in [
        dec!(1.10030),
        dec!(1.10020),
        dec!(1.10080),
        dec!(1.10060),
        dec!(1.10100),
    ] {
        set_mid(&broker, "EURUSD", mid).await;
        engine.run_trailing_stop_tick().await.unwrap();
        let stop = broker.stop_loss(1).await.unwrap();
        assert!(stop >= last, "stop went from {last} to {stop} at {mid}");
        last = stop;
    }
    assert_eq!(last, dec!(1.10089));
}

#[tokio::test]
async fn test_short_stop_is_monotonic_across_ticks() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(2, "GBPUSD", Side::Short, dec!(1.25000), dec!(1.25020)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let mut last = dec!(1.25020);
    for mid in [dec!(1.24990), dec!(1.25010), dec!(1.24950), dec!(1.24970)] {
        set_mid(&broker, "GBPUSD", mid).await;
        engine.run_trailing_stop_tick().await.unwrap();
        let stop = broker.stop_loss(2).await.unwrap();
        assert!(stop <= last, "stop went from {last} to {stop} at {mid}");
        last = stop;
    }
    // 1.25020 -> 1.25010 -> 1.24970
    assert_eq!(last, dec!(1.24970));
}

#[tokio::test]
async fn test_extrema_follow_open_positions() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(1, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09989)))
        .await;
    broker
        .insert_position(common::position(2, "GBPUSD", Side::Short, dec!(1.25000), dec!(1.25020)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    engine.run_trailing_stop_tick().await.unwrap();
    let state = engine.trailing_state().await;
    assert_eq!(state.tracked(Side::Long), vec!["EURUSD".to_string()]);
    assert_eq!(state.tracked(Side::Short), vec!["GBPUSD".to_string()]);

    // Short stopped out at the venue
    broker.remove_position(2).await;
    let tick = engine.run_trailing_stop_tick().await.unwrap();
    assert_eq!(tick.pruned, 1);
    let state = engine.trailing_state().await;
    assert_eq!(state.tracked(Side::Long), vec!["EURUSD".to_string()]);
    assert!(state.tracked(Side::Short).is_empty());

    broker.remove_position(1).await;
    let tick = engine.run_trailing_stop_tick().await.unwrap();
    assert_eq!(tick.positions, 0);
    assert_eq!(tick.pruned, 1);
    assert_eq!(engine.trailing_state().await, TrailingStopState::new());
}

#[tokio::test]
async fn test_failed_position_is_skipped_but_tracked() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(1, "XAUUSD", Side::Long, dec!(2400.00), dec!(2390.00)))
        .await;
    broker
        .insert_position(common::position(2, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09989)))
        .await;
    set_mid(&broker, "EURUSD", dec!(1.10050)).await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let tick = engine.run_trailing_stop_tick().await.unwrap();

    assert_eq!(tick.positions, 2);
    assert_eq!(tick.failures, 1);
    assert_eq!(tick.adjustments.len(), 1);
    assert_eq!(tick.adjustments[0].ticket, 2);
    assert_eq!(
        engine.trailing_state().await.tracked(Side::Long),
        vec!["EURUSD".to_string(), "XAUUSD".to_string()]
    );
}

#[tokio::test]
async fn test_position_without_stop_is_never_modified() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(4, "EURUSD", Side::Long, dec!(1.10000), dec!(0)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    set_mid(&broker, "EURUSD", dec!(1.10200)).await;
    let tick = engine.run_trailing_stop_tick().await.unwrap();

    assert!(tick.adjustments.is_empty());
    assert!(broker.submitted_orders().await.is_empty());
    assert_eq!(
        engine.trailing_state().await.extremum(Side::Long, "EURUSD"),
        Some(dec!(1.10200))
    );
}

#[tokio::test]
async fn test_rejected_modification_is_reported() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(1, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09989)))
        .await;
    set_mid(&broker, "EURUSD", dec!(1.10050)).await;
    broker.reject_next_order("Invalid stops").await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let tick = engine.run_trailing_stop_tick().await.unwrap();

    assert_eq!(tick.adjustments.len(), 1);
    assert!(!tick.adjustments[0].accepted);
    assert_eq!(tick.adjustments[0].comment, "Invalid stops");
    assert_eq!(broker.stop_loss(1).await, Some(dec!(1.09989)));
}

#[tokio::test]
async fn test_unreachable_venue_fails_tick() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(1, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09989)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);
    engine.run_trailing_stop_tick().await.unwrap();

    broker.set_unreachable(true).await;
    let result = engine.run_trailing_stop_tick().await;
    assert!(matches!(result, Err(EngineError::Connectivity(_))));
    assert_eq!(
        engine.trailing_state().await.tracked(Side::Long),
        vec!["EURUSD".to_string()]
    );
}

#[tokio::test]
async fn test_state_carries_over_to_new_engine() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(1, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09989)))
        .await;
    let first = common::engine(&broker, ReversalPolicy::TwoTick);
    set_mid(&broker, "EURUSD", dec!(1.10080)).await;
    first.run_trailing_stop_tick().await.unwrap();
    let state = first.trailing_state().await;

    let second = common::engine(&broker, ReversalPolicy::TwoTick).with_trailing_state(state);
    set_mid(&broker, "EURUSD", dec!(1.10060)).await;
    let tick = second.run_trailing_stop_tick().await.unwrap();
    assert!(tick.adjustments.is_empty());
    assert_eq!(broker.stop_loss(1).await, Some(dec!(1.10069)));
}

#[tokio::test]
async fn test_half_point_moves_still_trail() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(1, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09990)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    // Bid and ask take turns stepping up one point, so the mid moves by half
    let mut bid = dec!(1.09999);
    let mut ask = dec!(1.10001);
    broker.set_quote("EURUSD", bid, ask).await;
    engine.run_trailing_stop_tick().await.unwrap();
    for step in 0..10 {
        if step % 2 == 0 {
            bid += dec!(0.00001);
        } else {
            ask += dec!(0.00001);
        }
        broker.set_quote("EURUSD", bid, ask).await;
        engine.run_trailing_stop_tick().await.unwrap();
    }

    assert_eq!((bid + ask) / dec!(2), dec!(1.10005));
    assert_eq!(broker.stop_loss(1).await, Some(dec!(1.09995)));
}

#[tokio::test]
async fn test_rejected_modification_is_retried_next_tick() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(1, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09989)))
        .await;
    set_mid(&broker, "EURUSD", dec!(1.10050)).await;
    broker.reject_next_order("Invalid stops").await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    engine.run_trailing_stop_tick().await.unwrap();
    assert_eq!(
        engine.trailing_state().await.extremum(Side::Long, "EURUSD"),
        Some(dec!(1.10000))
    );

    let tick = engine.run_trailing_stop_tick().await.unwrap();
    assert!(tick.adjustments[0].accepted);
    assert_eq!(broker.stop_loss(1).await, Some(dec!(1.10039)));
}

/// Paper venue whose first quote waits until released
struct HeldQuoteBroker {
    inner: Arc<PaperBroker>,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    held: Notify,
}

#[async_trait]
impl Broker for HeldQuoteBroker {
    async fn quote(&self, symbol: &str) -> risk_engine::Result<Quote> {
        let hold = self.hold.lock().await.take();
        if let Some(hold) = hold {
            self.held.notify_one();
            let _ = hold.await;
        }
        self.inner.quote(symbol).await
    }

    async fn account_info(&self) -> risk_engine::Result<AccountInfo> {
        self.inner.account_info().await
    }

    async fn symbol_info(&self, symbol: &str) -> risk_engine::Result<SymbolInfo> {
        self.inner.symbol_info(symbol).await
    }

    async fn open_positions(&self) -> risk_engine::Result<Vec<BrokerPosition>> {
        self.inner.open_positions().await
    }

    async fn validate_order(&self, request: &OrderRequest) -> risk_engine::Result<bool> {
        self.inner.validate_order(request).await
    }

    async fn submit_order(&self, request: &OrderRequest) -> risk_engine::Result<OrderResult> {
        self.inner.submit_order(request).await
    }
}

#[tokio::test]
async fn test_reversal_during_tick_is_not_modified() {
    let paper = common::venue().await;
    paper
        .insert_position(common::position(5, "EURUSD", Side::Long, dec!(1.10000), dec!(1.09989)))
        .await;
    set_mid(&paper, "EURUSD", dec!(1.10050)).await;

    let (release, hold) = oneshot::channel();
    let broker = Arc::new(HeldQuoteBroker {
        inner: paper.clone(),
        hold: Mutex::new(Some(hold)),
        held: Notify::new(),
    });
    let config = ExecutionConfig {
        reversal: ReversalPolicy::SameTick,
        ..ExecutionConfig::default()
    };
    let engine = Arc::new(RiskEngine::new(broker.clone(), &config));

    // Tick has read ticket 5 and is waiting on its quote
    let tick = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run_trailing_stop_tick().await }
    });
    broker.held.notified().await;

    let decision = engine
        .run_decision(&DecisionRequest {
            symbol: "EURUSD".to_string(),
            intent: Intent::sell(),
            volume: dec!(0.10),
            risk_reward: RiskReward::default(),
        })
        .await
        .unwrap();
    assert_eq!(decision.actions.len(), 2);
    assert!(decision.actions.iter().all(|a| a.result.success));

    release.send(()).unwrap();
    let tick = tick.await.unwrap().unwrap();

    assert_eq!(tick.superseded, 1);
    assert!(tick.adjustments.is_empty());
    assert!(paper
        .submitted_orders()
        .await
        .iter()
        .all(|o| o.action != OrderAction::ModifyStops));
}
