// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Outbound notifications to the external decision-maker.
//!
//! Everything the bridge tells the decision-maker goes through an
//! [`EventSink`]: suspended exchanges waiting for a decision, conflict sets
//! waiting for a winner, and replication completion/error events.
//! Publishing is fire-and-forget and must never block the publisher, which
//! is usually a thread that is about to suspend.
//!
//! `tokio::sync::mpsc::UnboundedSender<BridgeEvent>` implements
//! [`EventSink`] directly, so the host can drain events from a channel:
//!
//! ```rust
//! use replication_bridge::events::{BridgeEvent, EventSink};
//! use replication_bridge::replicator::ReplicatorToken;
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel::<BridgeEvent>();
//! tx.publish(BridgeEvent::ReplicationCompleted { token: ReplicatorToken::new(42), documents_replicated: 3 });
//! assert!(rx.try_recv().is_ok());
//! ```

use crate::conflict::ConflictSnapshot;
use crate::exchange::{CorrelationId, Snapshot};
use crate::metrics;
use crate::replicator::ReplicatorToken;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// A notification for the external decision-maker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// An HTTP exchange of replicator `token` is suspended until a decision
    /// is posted for `correlation_id`.
    #[serde(rename_all = "camelCase")]
    Intercept {
        token: ReplicatorToken,
        correlation_id: CorrelationId,
        snapshot: Snapshot,
    },

    /// A document's conflicts are suspended until a resolution is posted
    /// for `resolver_id`.
    #[serde(rename_all = "camelCase")]
    ConflictsPending {
        resolver_id: CorrelationId,
        snapshot: ConflictSnapshot,
    },

    /// Replication finished.
    #[serde(rename_all = "camelCase")]
    ReplicationCompleted {
        token: ReplicatorToken,
        documents_replicated: u64,
    },

    /// Replication failed.
    #[serde(rename_all = "camelCase")]
    ReplicationErrored {
        token: ReplicatorToken,
        message: String,
    },
}

/// Receiver of bridge notifications.
pub trait EventSink: Send + Sync + 'static {
    /// Deliver an event. Must not block.
    fn publish(&self, event: BridgeEvent);
}

impl EventSink for mpsc::UnboundedSender<BridgeEvent> {
    fn publish(&self, event: BridgeEvent) {
        if self.send(event).is_err() {
            // Nobody is listening; waiters fall back to their own timeouts
            debug!("Event receiver dropped, event discarded");
        }
    }
}

/// A sink that discards every event (standalone/testing mode).
#[derive(Debug, Clone, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn publish(&self, event: BridgeEvent) {
        trace!(?event, "NoOp: would publish event");
    }
}

/// Forwards one replication task's lifecycle events to the decision-maker.
///
/// Handed to the replication engine when the task is built.
#[derive(Clone)]
pub struct ReplicationListener {
    token: ReplicatorToken,
    sink: Arc<dyn EventSink>,
}

impl ReplicationListener {
    pub fn new(token: ReplicatorToken, sink: Arc<dyn EventSink>) -> Self {
        Self { token, sink }
    }

    pub fn token(&self) -> ReplicatorToken {
        self.token
    }

    /// Replication completed after transferring `documents_replicated` documents.
    pub fn completed(&self, documents_replicated: u64) {
        debug!(token = %self.token, documents_replicated, "Replication completed");
        metrics::record_replication_event("complete");
        self.sink.publish(BridgeEvent::ReplicationCompleted {
            token: self.token,
            documents_replicated,
        });
    }

    /// Replication failed.
    pub fn errored(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(token = %self.token, error = %message, "Replication errored");
        metrics::record_replication_event("error");
        self.sink.publish(BridgeEvent::ReplicationErrored {
            token: self.token,
            message,
        });
    }
}

impl std::fmt::Debug for ReplicationListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationListener")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
