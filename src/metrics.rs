// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Suspended exchanges (registered, completed, pending)
//! - Decision wait times per exchange kind
//! - Duplicate and malformed decisions
//! - Conflict resolution outcomes
//! - Replicator lifecycle and replication events
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `bridge_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration)
//!
//! The library only records through the `metrics` facade; installing an
//! exporter is up to the host process.

use crate::exchange::ExchangeKind;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a newly registered exchange.
pub fn record_exchange_registered(kind: ExchangeKind) {
    counter!("bridge_exchanges_registered_total", "kind" => kind.as_str()).increment(1);
}

/// Gauge for exchanges currently suspended.
pub fn set_pending_exchanges(count: usize) {
    gauge!("bridge_pending_exchanges").set(count as f64);
}

/// Record how long a wait lasted and how it ended.
pub fn record_decision_wait(kind: ExchangeKind, outcome: &'static str, duration: Duration) {
    counter!(
        "bridge_exchanges_completed_total",
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("bridge_decision_wait_seconds", "kind" => kind.as_str())
        .record(duration.as_secs_f64());
}

/// Record a decision posted for an already-resolved exchange.
pub fn record_duplicate_decision() {
    counter!("bridge_duplicate_decisions_total").increment(1);
}

/// Record a decision that failed validation and was treated as "no change".
pub fn record_malformed_decision(kind: ExchangeKind) {
    counter!("bridge_malformed_decisions_total", "kind" => kind.as_str()).increment(1);
}

/// Record the outcome of one document's conflict resolution.
///
/// Outcomes: `winner`, `abandoned`, `mismatch_rejected`, `mismatch_accepted`.
pub fn record_conflict_resolution(outcome: &'static str) {
    counter!("bridge_conflict_resolutions_total", "outcome" => outcome).increment(1);
}

/// Gauge for resolutions currently holding a pool slot.
pub fn set_active_resolutions(count: usize) {
    gauge!("bridge_active_resolutions").set(count as f64);
}

/// Record a replicator lifecycle operation (create, start, stop, destroy).
pub fn record_replicator_operation(operation: &'static str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "bridge_replicator_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Gauge for live replicators.
pub fn set_live_replicators(count: usize) {
    gauge!("bridge_live_replicators").set(count as f64);
}

/// Record a replication event forwarded to the decision-maker.
pub fn record_replication_event(event: &'static str) {
    counter!("bridge_replication_events_total", "event" => event).increment(1);
}

/// Record errors by type.
pub fn record_error(error_type: &'static str) {
    counter!("bridge_errors_total", "error_type" => error_type).increment(1);
}
