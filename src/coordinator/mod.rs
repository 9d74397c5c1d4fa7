// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bridge coordinator.
//!
//! The facade the host talks to. It ties together:
//! - The shared [`ExchangeRegistry`] every bridge suspends on
//! - Named document stores via [`StoreRegistry`]
//! - Replicator lifecycle via [`ReplicatorRegistry`]
//! - Conflict resolution via [`ConflictBridge`] on a [`ResolutionPool`]
//!
//! # Architecture
//!
//! ```text
//!   host ── BridgeCommand ──→ BridgeCoordinator ──→ ReplicatorRegistry ──→ engine task
//!    ↑                              │                      │
//!    │                              │                InterceptionBridge ─┐
//!    │                              └──→ ResolutionPool ──→ ConflictBridge ┤
//!    │                                                                    ↓
//!    └──────────────────────── BridgeEvent ←───────────── ExchangeRegistry
//! ```
//!
//! Control operations (create, start, stop, status, destroy, posts) are
//! synchronous and never wait on a suspended exchange. Conflict
//! resolutions run on the pool and may wait indefinitely.

mod command;
mod types;

pub use command::{BridgeCommand, CommandReply};
pub use types::BridgeHealth;

use crate::config::BridgeConfig;
use crate::conflict::{ConflictBridge, DocumentRevision, ResolutionPool};
use crate::engine::{ConflictResolver, DocumentStore, ReplicatorFactory};
use crate::error::{BridgeError, Result};
use crate::events::EventSink;
use crate::exchange::{CorrelationId, ExchangeRegistry};
use crate::interceptor::InterceptorDecision;
use crate::metrics;
use crate::replicator::{ReplicationState, ReplicatorRegistry, ReplicatorSpec, ReplicatorToken};
use crate::store::StoreRegistry;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for the host process.
pub struct BridgeCoordinator {
    config: BridgeConfig,
    exchanges: Arc<ExchangeRegistry>,
    stores: Arc<StoreRegistry>,
    replicators: ReplicatorRegistry,
    conflicts: Arc<ConflictBridge>,
    pool: ResolutionPool,
}

impl BridgeCoordinator {
    /// Create a coordinator.
    ///
    /// `factory` builds replication tasks; `sink` receives every event for
    /// the decision-maker.
    pub fn new(config: BridgeConfig, factory: Arc<dyn ReplicatorFactory>, sink: Arc<dyn EventSink>) -> Self {
        let exchanges = Arc::new(ExchangeRegistry::new());
        let stores = Arc::new(StoreRegistry::new());
        let decision_timeout = config.interceptor.decision_timeout_duration();

        let replicators = ReplicatorRegistry::new(
            factory,
            Arc::clone(&stores),
            Arc::clone(&exchanges),
            Arc::clone(&sink),
            decision_timeout,
        );
        let conflicts = Arc::new(ConflictBridge::new(
            Arc::clone(&exchanges),
            sink,
            config.conflict.unknown_revision,
        ));
        let pool = ResolutionPool::new(config.conflict.max_concurrent_resolutions);

        info!(
            decision_timeout_ms = u64::try_from(decision_timeout.as_millis()).unwrap_or(u64::MAX),
            max_concurrent_resolutions = pool.max_concurrent(),
            unknown_revision = ?config.conflict.unknown_revision,
            "Bridge coordinator created"
        );

        Self {
            config,
            exchanges,
            stores,
            replicators,
            conflicts,
            pool,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn exchanges(&self) -> &Arc<ExchangeRegistry> {
        &self.exchanges
    }

    pub fn stores(&self) -> &Arc<StoreRegistry> {
        &self.stores
    }

    pub fn replicators(&self) -> &ReplicatorRegistry {
        &self.replicators
    }

    pub fn conflict_bridge(&self) -> &Arc<ConflictBridge> {
        &self.conflicts
    }

    /// Make a document store available under `name`.
    pub fn register_store(&self, name: impl Into<String>, store: Arc<dyn DocumentStore>) {
        self.stores.register(name, store);
    }

    // =========================================================================
    // Replicator lifecycle
    // =========================================================================

    /// Validate the raw parameters and create a replicator under `token`.
    pub fn create_replicator(
        &self,
        token: ReplicatorToken,
        store_name: &str,
        uri: &str,
        direction: &str,
    ) -> Result<()> {
        let spec = ReplicatorSpec::parse(store_name, uri, direction).inspect_err(|e| {
            metrics::record_replicator_operation("create", false);
            metrics::record_error(e.error_type());
        })?;
        self.replicators.create(token, spec)
    }

    pub fn start_replication(&self, token: ReplicatorToken) -> Result<()> {
        self.replicators.start(token)
    }

    /// Returns `Stopping` once the stop was requested.
    pub fn stop_replication(&self, token: ReplicatorToken) -> Result<ReplicationState> {
        self.replicators.stop(token)
    }

    pub fn replication_status(&self, token: ReplicatorToken) -> Result<ReplicationState> {
        self.replicators.status(token)
    }

    pub fn destroy_replicator(&self, token: ReplicatorToken) -> Result<()> {
        self.replicators.destroy(token)
    }

    /// Post an interceptor decision for replicator `token`.
    pub fn post_interceptor_decision(
        &self,
        token: ReplicatorToken,
        correlation_id: &CorrelationId,
        decision: Option<InterceptorDecision>,
        elapsed_hint_ms: Option<u64>,
    ) -> Result<()> {
        self.replicators
            .post_interceptor_decision(token, correlation_id, decision, elapsed_hint_ms)
    }

    /// Post a decision exactly as the host sent it. A payload that does not
    /// parse as a decision resumes the exchange unchanged.
    pub fn unlock_interceptor(
        &self,
        token: ReplicatorToken,
        correlation_id: &CorrelationId,
        decision: Option<Value>,
        elapsed_hint_ms: Option<u64>,
    ) -> Result<()> {
        self.replicators
            .post_raw_interceptor_decision(token, correlation_id, decision, elapsed_hint_ms)
    }

    // =========================================================================
    // Conflicts
    // =========================================================================

    /// Ids of the documents in `store_name` that have conflicts.
    pub async fn conflicted_document_ids(&self, store_name: &str) -> Result<Vec<String>> {
        let store = self.stores.get(store_name)?;
        let ids = store.conflicted_document_ids().await?;
        debug!(store = %store_name, count = ids.len(), "Conflicted documents listed");
        Ok(ids)
    }

    /// Resolve one document's conflicts through the decision-maker.
    ///
    /// Runs on the resolution pool and completes when the store has applied
    /// (or abandoned) the resolution. Dropping the returned future does not
    /// cancel the resolution.
    pub async fn resolve_conflicts_for_document(&self, store_name: &str, doc_id: &str) -> Result<()> {
        let store = self.stores.get(store_name)?;
        let resolver: Arc<dyn ConflictResolver> = Arc::clone(&self.conflicts) as Arc<dyn ConflictResolver>;
        let owned_doc_id = doc_id.to_string();

        debug!(store = %store_name, doc_id, available = self.pool.available(), "Queueing conflict resolution");
        let handle = self
            .pool
            .spawn(async move { store.resolve_conflicts(&owned_doc_id, resolver).await });

        match handle.await {
            Ok(Some(result)) => result.map_err(BridgeError::from),
            Ok(None) => Err(BridgeError::Internal("resolution pool closed".to_string())),
            Err(e) => {
                warn!(doc_id, error = %e, "Conflict resolution task failed");
                Err(BridgeError::Internal(format!("resolution task failed: {}", e)))
            }
        }
    }

    /// Post the winner (or `None` to abandon) for a suspended conflict set.
    pub fn post_conflict_resolution(
        &self,
        resolver_id: &CorrelationId,
        revision: Option<DocumentRevision>,
    ) -> Result<()> {
        self.conflicts.post_resolution(resolver_id, revision)
    }

    /// Post a resolution exactly as the host sent it. A payload that is not
    /// a revision abandons the resolution.
    pub fn return_resolved_document(&self, resolver_id: &CorrelationId, revision: Option<Value>) -> Result<()> {
        self.conflicts.post_raw_resolution(resolver_id, revision)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Execute one typed command.
    pub async fn execute(&self, command: BridgeCommand) -> Result<CommandReply> {
        let action = command.action();
        debug!(action, "Executing command");

        let reply = match command {
            BridgeCommand::CreateReplicator {
                token,
                store_name,
                uri,
                direction,
            } => self
                .create_replicator(token, &store_name, &uri, &direction)
                .map(|()| CommandReply::Done),
            BridgeCommand::StartReplication { token } => {
                self.start_replication(token).map(|()| CommandReply::Done)
            }
            BridgeCommand::StopReplication { token } => self.stop_replication(token).map(CommandReply::State),
            BridgeCommand::GetReplicationStatus { token } => {
                self.replication_status(token).map(CommandReply::State)
            }
            BridgeCommand::DestroyReplicator { token } => {
                self.destroy_replicator(token).map(|()| CommandReply::Done)
            }
            BridgeCommand::UnlockInterceptor {
                token,
                correlation_id,
                decision,
                elapsed_ms,
            } => self
                .unlock_interceptor(token, &correlation_id, decision, elapsed_ms)
                .map(|()| CommandReply::Done),
            BridgeCommand::GetConflictedDocumentIds { store_name } => self
                .conflicted_document_ids(&store_name)
                .await
                .map(CommandReply::DocumentIds),
            BridgeCommand::ResolveConflictsForDocument { store_name, doc_id } => self
                .resolve_conflicts_for_document(&store_name, &doc_id)
                .await
                .map(|()| CommandReply::Done),
            BridgeCommand::ReturnResolvedDocument { resolver_id, revision } => self
                .return_resolved_document(&resolver_id, revision)
                .map(|()| CommandReply::Done),
        };

        if let Err(e) = &reply {
            debug!(action, error = %e, "Command failed");
        }
        reply
    }

    /// Parse and execute a JSON command.
    pub async fn execute_json(&self, input: &str) -> Result<CommandReply> {
        let command = BridgeCommand::from_json(input).inspect_err(|e| {
            warn!(error = %e, "Rejected malformed command");
            metrics::record_error(e.error_type());
        })?;
        self.execute(command).await
    }

    /// Snapshot of the shared state.
    pub fn health(&self) -> BridgeHealth {
        let conflict_ids = self.conflicts.pending_resolver_ids().len();
        BridgeHealth {
            live_replicators: self.replicators.len(),
            stores: self.stores.len(),
            pending_interceptions: self.exchanges.len().saturating_sub(conflict_ids),
            pending_resolutions: conflict_ids,
            resolution_slots_available: self.pool.available(),
            resolution_slots_total: self.pool.max_concurrent(),
        }
    }
}
