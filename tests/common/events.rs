//! Event stream helpers.
//!
//! Wraps the receiving end of the coordinator's event channel and waits for
//! the next event of a given shape, failing the test after a deadline.

use replication_bridge::conflict::ConflictSnapshot;
use replication_bridge::events::BridgeEvent;
use replication_bridge::exchange::{CorrelationId, Snapshot};
use replication_bridge::replicator::ReplicatorToken;
use std::time::Duration;
use tokio::sync::mpsc;

const EVENT_DEADLINE: Duration = Duration::from_secs(5);

pub struct EventStream {
    rx: mpsc::UnboundedReceiver<BridgeEvent>,
}

impl EventStream {
    pub fn new(rx: mpsc::UnboundedReceiver<BridgeEvent>) -> Self {
        Self { rx }
    }

    /// Next event of any kind.
    pub async fn next(&mut self) -> BridgeEvent {
        tokio::time::timeout(EVENT_DEADLINE, self.rx.recv())
            .await
            .expect("no event within deadline")
            .expect("event channel closed")
    }

    /// Next interceptor event: (token, correlation id, snapshot).
    pub async fn next_intercept(&mut self) -> (ReplicatorToken, CorrelationId, Snapshot) {
        match self.next().await {
            BridgeEvent::Intercept {
                token,
                correlation_id,
                snapshot,
            } => (token, correlation_id, snapshot),
            other => panic!("expected intercept event, got {:?}", other),
        }
    }

    /// Next conflict event: (resolver id, snapshot).
    pub async fn next_conflict(&mut self) -> (CorrelationId, ConflictSnapshot) {
        match self.next().await {
            BridgeEvent::ConflictsPending { resolver_id, snapshot } => (resolver_id, snapshot),
            other => panic!("expected conflicts event, got {:?}", other),
        }
    }

    /// Whatever is queued right now.
    pub fn drain(&mut self) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
