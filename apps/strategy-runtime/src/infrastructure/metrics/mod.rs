//! Prometheus Metrics Module
//!
//! Counters describing the flow of ticks and events through the runtime.
//!
//! # Metrics
//!
//! - `strategy_ticks_received_total`: ticks delivered by the feed
//! - `strategy_ticks_dropped_total`: ticks for instruments the registry does not know
//! - `strategy_events_enqueued_total{kind}`: events pushed by the ingestor
//! - `strategy_events_processed_total{kind}`: events executed by the consumer loop
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can record unconditionally.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::events::EventKind;

// =============================================================================
// Exporter
// =============================================================================

/// Install the Prometheus recorder with a scrape endpoint on `port`.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener
/// cannot be bound.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "strategy_ticks_received_total",
        "Total ticks delivered by the market feed"
    );
    describe_counter!(
        "strategy_ticks_dropped_total",
        "Total ticks dropped because the instrument could not be resolved"
    );
    describe_counter!(
        "strategy_events_enqueued_total",
        "Total strategy events enqueued by kind"
    );
    describe_counter!(
        "strategy_events_processed_total",
        "Total strategy events executed by kind"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a tick delivered by the feed.
pub fn record_tick_received() {
    counter!("strategy_ticks_received_total").increment(1);
}

/// Record a tick dropped for an unknown instrument.
pub fn record_tick_dropped() {
    counter!("strategy_ticks_dropped_total").increment(1);
}

/// Record an event pushed onto the queue.
pub fn record_event_enqueued(kind: EventKind) {
    counter!("strategy_events_enqueued_total", "kind" => kind.as_str()).increment(1);
}

/// Record an event executed by the consumer loop.
pub fn record_event_processed(kind: EventKind) {
    counter!("strategy_events_processed_total", "kind" => kind.as_str()).increment(1);
}
