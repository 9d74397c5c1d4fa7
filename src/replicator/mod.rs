// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replicator lifecycle registry.
//!
//! Maps a caller-supplied [`ReplicatorToken`] to one replication task and
//! the [`InterceptionBridge`] installed on it. Task and bridge are built
//! together and live in a single map entry, so inserting or removing the
//! pair is one atomic map operation.
//!
//! # Lifecycle
//!
//! ```text
//! create(token, spec) ─→ start(token) ─→ stop(token) ─→ destroy(token)
//!         │                                                  ↑
//!         └──────────────────────────────────────────────────┘
//!                       destroy is allowed from any state
//! ```
//!
//! Construction failures leave no entry behind. Lookups of unknown tokens
//! report `NotFound`.

mod types;

pub use types::{ReplicationDirection, ReplicationState, ReplicatorSpec, ReplicatorToken};

use crate::engine::{BuildRequest, HttpInterceptor, ReplicationTask, ReplicatorFactory};
use crate::error::{BridgeError, Result};
use crate::events::{EventSink, ReplicationListener};
use crate::exchange::{CorrelationId, ExchangeRegistry};
use crate::interceptor::{InterceptionBridge, InterceptorDecision};
use crate::metrics;
use crate::store::StoreRegistry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One live replicator: its task and its interception bridge.
pub struct Replicator {
    token: ReplicatorToken,
    spec: ReplicatorSpec,
    task: Arc<dyn ReplicationTask>,
    interceptor: Arc<InterceptionBridge>,
    created_at: Instant,
}

impl Replicator {
    pub fn token(&self) -> ReplicatorToken {
        self.token
    }

    pub fn spec(&self) -> &ReplicatorSpec {
        &self.spec
    }

    pub fn state(&self) -> ReplicationState {
        self.task.state()
    }

    pub fn interceptor(&self) -> &Arc<InterceptionBridge> {
        &self.interceptor
    }

    /// Time since the replicator was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Registry of live replicators keyed by token.
pub struct ReplicatorRegistry {
    replicators: DashMap<ReplicatorToken, Arc<Replicator>>,
    factory: Arc<dyn ReplicatorFactory>,
    stores: Arc<StoreRegistry>,
    exchanges: Arc<ExchangeRegistry>,
    sink: Arc<dyn EventSink>,
    decision_timeout: Duration,
}

impl ReplicatorRegistry {
    pub fn new(
        factory: Arc<dyn ReplicatorFactory>,
        stores: Arc<StoreRegistry>,
        exchanges: Arc<ExchangeRegistry>,
        sink: Arc<dyn EventSink>,
        decision_timeout: Duration,
    ) -> Self {
        Self {
            replicators: DashMap::new(),
            factory,
            stores,
            exchanges,
            sink,
            decision_timeout,
        }
    }

    /// Build a replicator for `spec` and store it under `token`.
    ///
    /// Fails with `TokenInUse` if the token is live, `NotFound` if the store
    /// is unknown, or `Construction` if the engine rejects the spec. Nothing
    /// is stored on failure.
    pub fn create(&self, token: ReplicatorToken, spec: ReplicatorSpec) -> Result<()> {
        let result = self.build(token, spec);
        record("create", &result);
        result
    }

    fn build(&self, token: ReplicatorToken, spec: ReplicatorSpec) -> Result<()> {
        if self.replicators.contains_key(&token) {
            return Err(BridgeError::TokenInUse(token.value()));
        }
        let store = self.stores.get(&spec.store_name)?;

        let interceptor = Arc::new(InterceptionBridge::new(
            token,
            Arc::clone(&self.exchanges),
            Arc::clone(&self.sink),
            self.decision_timeout,
        ));
        let request = BuildRequest {
            spec: spec.clone(),
            store,
            interceptor: Arc::clone(&interceptor) as Arc<dyn HttpInterceptor>,
            listener: ReplicationListener::new(token, Arc::clone(&self.sink)),
        };
        // Built outside the map so a slow engine never holds a shard lock
        let task = self.factory.build(request).map_err(|e| {
            BridgeError::Construction(format!("failed to create {} replicator: {}", spec.direction, e))
        })?;

        let replicator = Arc::new(Replicator {
            token,
            spec,
            task,
            interceptor,
            created_at: Instant::now(),
        });

        match self.replicators.entry(token) {
            // Lost a race with a concurrent create for the same token
            Entry::Occupied(_) => Err(BridgeError::TokenInUse(token.value())),
            Entry::Vacant(slot) => {
                info!(
                    token = %token,
                    store = %replicator.spec.store_name,
                    remote = %replicator.spec.redacted_url(),
                    direction = %replicator.spec.direction,
                    "Replicator created"
                );
                slot.insert(replicator);
                metrics::set_live_replicators(self.replicators.len());
                Ok(())
            }
        }
    }

    /// Look up a live replicator.
    pub fn get(&self, token: ReplicatorToken) -> Result<Arc<Replicator>> {
        self.replicators
            .get(&token)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BridgeError::not_found("replicator", token))
    }

    /// Start replicating.
    pub fn start(&self, token: ReplicatorToken) -> Result<()> {
        let result = self.get(token).map(|replicator| {
            replicator.task.start();
            info!(token = %token, "Replication started");
        });
        record("start", &result);
        result
    }

    /// Request the task to stop. Returns `Stopping` without waiting for it.
    pub fn stop(&self, token: ReplicatorToken) -> Result<ReplicationState> {
        let result = self.get(token).map(|replicator| {
            replicator.task.stop();
            info!(token = %token, "Replication stopping");
            ReplicationState::Stopping
        });
        record("stop", &result);
        result
    }

    /// Current state of the task.
    pub fn status(&self, token: ReplicatorToken) -> Result<ReplicationState> {
        let replicator = self.get(token)?;
        let state = replicator.state();
        debug!(token = %token, state = %state, "Replication status");
        Ok(state)
    }

    /// Remove the replicator and its bridge.
    ///
    /// The bridge is closed: exchanges still suspended on it resume
    /// unmodified and later exchanges pass through without being suspended.
    /// The task is not stopped; call [`stop`](Self::stop) first to end
    /// replication.
    pub fn destroy(&self, token: ReplicatorToken) -> Result<()> {
        let result = match self.replicators.remove(&token) {
            Some((_, replicator)) => {
                metrics::set_live_replicators(self.replicators.len());
                let released = replicator.interceptor.close();
                info!(
                    token = %token,
                    released,
                    age_secs = replicator.age().as_secs(),
                    "Replicator destroyed"
                );
                Ok(())
            }
            None => Err(BridgeError::not_found("replicator", token)),
        };
        record("destroy", &result);
        result
    }

    /// Route a decision to the bridge of replicator `token`.
    pub fn post_interceptor_decision(
        &self,
        token: ReplicatorToken,
        correlation_id: &CorrelationId,
        decision: Option<InterceptorDecision>,
        elapsed_hint_ms: Option<u64>,
    ) -> Result<()> {
        let replicator = self.get(token)?;
        replicator
            .interceptor
            .post_decision(correlation_id, decision, elapsed_hint_ms)
    }

    /// Route an untyped decision, as received from the host, to the bridge
    /// of replicator `token`.
    pub fn post_raw_interceptor_decision(
        &self,
        token: ReplicatorToken,
        correlation_id: &CorrelationId,
        decision: Option<Value>,
        elapsed_hint_ms: Option<u64>,
    ) -> Result<()> {
        let replicator = self.get(token)?;
        replicator
            .interceptor
            .post_raw_decision(correlation_id, decision, elapsed_hint_ms)
    }

    /// Live tokens, sorted.
    pub fn tokens(&self) -> Vec<ReplicatorToken> {
        let mut tokens: Vec<ReplicatorToken> = self.replicators.iter().map(|e| *e.key()).collect();
        tokens.sort();
        tokens
    }

    pub fn contains(&self, token: ReplicatorToken) -> bool {
        self.replicators.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.replicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicators.is_empty()
    }
}

fn record<T>(operation: &'static str, result: &Result<T>) {
    metrics::record_replicator_operation(operation, result.is_ok());
    if let Err(e) = result {
        warn!(operation, error = %e, "Replicator operation failed");
        metrics::record_error(e.error_type());
    }
}
