//! Decision controller integration tests

mod common;

use risk_engine::broker::{FillingMode, OrderAction, OrderType};
use risk_engine::config::ReversalPolicy;
use risk_engine::engine::Action;
use risk_engine::position::Side;
use risk_engine::risk::RiskReward;
use risk_engine::{DecisionRequest, EngineError, Intent};
use rust_decimal_macros::dec;

fn request(symbol: &str, intent: Intent) -> DecisionRequest {
    DecisionRequest {
        symbol: symbol.to_string(),
        intent,
        volume: dec!(0.10),
        risk_reward: RiskReward {
            risk: dec!(0.01),
            reward: dec!(0.02),
        },
    }
}

#[tokio::test]
async fn test_no_position_buy_opens_exactly_one_long() {
    let broker = common::venue().await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let report = engine
        .run_decision(&request("EURUSD", Intent::buy()))
        .await
        .unwrap();

    assert_eq!(report.prior_state, "none");
    assert_eq!(report.actions.len(), 1);
    assert_eq!(report.actions[0].action, Action::Open { side: Side::Long });
    assert!(report.actions[0].result.success);

    let orders = broker.submitted_orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_type, OrderType::Buy);
    assert!(orders[0].position.is_none());
    assert_eq!(orders[0].stop_loss, Some(dec!(1.09989)));
    assert_eq!(orders[0].take_profit, Some(dec!(1.10022)));

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.positions()[0].side, Side::Long);
}

#[tokio::test]
async fn test_long_with_flat_intent_issues_no_mutation() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(5, "EURUSD", Side::Long, dec!(1.1), dec!(1.09989)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::SameTick);

    let report = engine
        .run_decision(&request("EURUSD", Intent::flat()))
        .await
        .unwrap();

    assert_eq!(report.prior_state, "long");
    assert!(report.is_noop());
    assert!(broker.submitted_orders().await.is_empty());
}

#[tokio::test]
async fn test_long_with_buy_intent_is_noop() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(5, "EURUSD", Side::Long, dec!(1.1), dec!(1.09989)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let report = engine
        .run_decision(&request("EURUSD", Intent::buy()))
        .await
        .unwrap();
    assert!(report.is_noop());
    assert!(broker.submitted_orders().await.is_empty());
}

#[tokio::test]
async fn test_two_tick_reversal() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(5, "EURUSD", Side::Long, dec!(1.1), dec!(1.09989)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    // First tick closes the long only
    let first = engine
        .run_decision(&request("EURUSD", Intent::sell()))
        .await
        .unwrap();
    assert_eq!(first.actions.len(), 1);
    assert!(matches!(
        first.actions[0].action,
        Action::Close { side: Side::Long, ticket: 5, .. }
    ));
    assert!(engine.snapshot().await.unwrap().is_empty());

    // Second tick sees no position and opens the short
    let second = engine
        .run_decision(&request("EURUSD", Intent::sell()))
        .await
        .unwrap();
    assert_eq!(second.prior_state, "none");
    assert_eq!(second.actions[0].action, Action::Open { side: Side::Short });

    let orders = broker.submitted_orders().await;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].position, Some(5));
    assert_eq!(orders[0].order_type, OrderType::Sell);
    assert_eq!(orders[1].order_type, OrderType::Sell);
    assert!(orders[1].position.is_none());
}

#[tokio::test]
async fn test_same_tick_reversal() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(8, "EURUSD", Side::Short, dec!(1.1), dec!(1.10011)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::SameTick);

    let report = engine
        .run_decision(&request("EURUSD", Intent::buy()))
        .await
        .unwrap();

    assert_eq!(report.actions.len(), 2);
    assert!(report.actions.iter().all(|a| a.result.success));
    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.positions()[0].side, Side::Long);
}

#[tokio::test]
async fn test_rejected_close_does_not_open() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(8, "EURUSD", Side::Short, dec!(1.1), dec!(1.10011)))
        .await;
    broker.reject_next_order("Market closed").await;
    let engine = common::engine(&broker, ReversalPolicy::SameTick);

    let report = engine
        .run_decision(&request("EURUSD", Intent::buy()))
        .await
        .unwrap();

    assert_eq!(report.actions.len(), 1);
    assert_eq!(report.rejections().count(), 1);
    assert_eq!(report.actions[0].result.comment, "Market closed");
    assert_eq!(broker.submitted_orders().await.len(), 1);
    assert_eq!(engine.snapshot().await.unwrap().positions()[0].side, Side::Short);
}

#[tokio::test]
async fn test_balance_change_recorded_on_close() {
    let broker = common::venue().await;
    broker
        .insert_position(common::position(3, "EURUSD", Side::Long, dec!(1.09000), dec!(0)))
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let report = engine
        .run_decision(&request("EURUSD", Intent::sell()))
        .await
        .unwrap();

    // (1.09998 - 1.09000) * 0.10 * 100000 = 99.8
    let record = &report.actions[0];
    assert_eq!(record.balance_before, Some(dec!(10000)));
    assert_eq!(record.balance_after, Some(dec!(10099.8)));
    assert_eq!(record.balance_change_pct, Some(dec!(0.998)));
}

#[tokio::test]
async fn test_no_filling_mode_aborts_symbol_only() {
    let broker = common::venue().await;
    broker.set_filling_modes("EURUSD", vec![]).await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let result = engine.run_decision(&request("EURUSD", Intent::buy())).await;
    assert!(matches!(result, Err(EngineError::NoAcceptableFillingMode(_))));
    assert!(broker.submitted_orders().await.is_empty());

    // Another symbol still trades
    let report = engine
        .run_decision(&request("GBPUSD", Intent::sell()))
        .await
        .unwrap();
    assert!(report.actions[0].result.success);
}

#[tokio::test]
async fn test_filling_mode_probed_once_per_symbol() {
    let broker = common::venue().await;
    broker
        .set_filling_modes("EURUSD", vec![FillingMode::Return])
        .await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    engine
        .run_decision(&request("EURUSD", Intent::buy()))
        .await
        .unwrap();
    engine
        .run_decision(&request("EURUSD", Intent::sell()))
        .await
        .unwrap();

    // fok, ioc refused then return accepted, all on the first order only
    assert_eq!(broker.validated_orders().await.len(), 3);
    let orders = broker.submitted_orders().await;
    assert_eq!(orders.len(), 2);
    assert!(orders
        .iter()
        .all(|o| o.action == OrderAction::Deal && o.filling == Some(FillingMode::Return)));
}

#[tokio::test]
async fn test_unreachable_broker_is_connectivity_error() {
    let broker = common::venue().await;
    broker.set_unreachable(true).await;
    let engine = common::engine(&broker, ReversalPolicy::TwoTick);

    let result = engine.run_decision(&request("EURUSD", Intent::buy())).await;
    assert!(matches!(result, Err(EngineError::Connectivity(_))));
}

#[tokio::test]
async fn test_contradictory_intent_holds() {
    let broker = common::venue().await;
    let engine = common::engine(&broker, ReversalPolicy::SameTick);
    let both = Intent {
        want_buy: true,
        want_sell: true,
    };

    let report = engine.run_decision(&request("EURUSD", both)).await.unwrap();
    assert!(report.is_noop());
    assert!(broker.submitted_orders().await.is_empty());
}
