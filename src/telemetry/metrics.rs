//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// A single broker round trip
    BrokerCall,
    /// One full decision for a symbol
    Decision,
    /// One trailing-stop pass over all positions
    TrailingTick,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Open position count
    OpenPositions,
    /// Symbols tracked in the trailing state
    TrackedExtrema,
    /// Account balance after the latest order
    Balance,
}

/// Order kinds counted separately
#[derive(Debug, Clone, Copy)]
pub enum OrderKind {
    Open,
    Close,
    ModifyStop,
}

impl OrderKind {
    fn label(self) -> &'static str {
        match self {
            OrderKind::Open => "open",
            OrderKind::Close => "close",
            OrderKind::ModifyStop => "modify_stop",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::BrokerCall => "riskengine_broker_call_latency_ms",
        LatencyMetric::Decision => "riskengine_decision_latency_ms",
        LatencyMetric::TrailingTick => "riskengine_trailing_tick_latency_ms",
    };

    ::metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::OpenPositions => "riskengine_open_positions",
        GaugeMetric::TrackedExtrema => "riskengine_tracked_extrema",
        GaugeMetric::Balance => "riskengine_balance",
    };

    ::metrics::gauge!(metric_name).set(value);
}

/// Count a submitted order and whether the venue accepted it
pub fn record_order(kind: OrderKind, success: bool) {
    let outcome = if success { "accepted" } else { "rejected" };
    ::metrics::counter!(
        "riskengine_orders_total",
        "kind" => kind.label(),
        "outcome" => outcome
    )
    .increment(1);
}
