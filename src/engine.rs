// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collaborator seams.
//!
//! The bridge does not implement a document store or a replication protocol.
//! It consumes them through the traits in this module, and in turn hands the
//! engine two hooks of its own:
//!
//! - [`HttpInterceptor`]: called by the replication engine around every
//!   outbound HTTP exchange (implemented by
//!   [`InterceptionBridge`](crate::interceptor::InterceptionBridge))
//! - [`ConflictResolver`]: called by the document store with one document's
//!   conflicting revisions (implemented by
//!   [`ConflictBridge`](crate::conflict::ConflictBridge))
//!
//! # Example
//!
//! ```rust,no_run
//! use replication_bridge::engine::{ReplicationTask, ReplicatorFactory, BuildRequest, EngineResult};
//! use replication_bridge::replicator::ReplicationState;
//! use std::sync::Arc;
//!
//! struct IdleTask;
//!
//! impl ReplicationTask for IdleTask {
//!     fn start(&self) {}
//!     fn stop(&self) {}
//!     fn state(&self) -> ReplicationState {
//!         ReplicationState::Pending
//!     }
//! }
//!
//! struct IdleFactory;
//!
//! impl ReplicatorFactory for IdleFactory {
//!     fn build(&self, _request: BuildRequest) -> EngineResult<Arc<dyn ReplicationTask>> {
//!         Ok(Arc::new(IdleTask))
//!     }
//! }
//! ```

use crate::conflict::DocumentRevision;
use crate::events::ReplicationListener;
use crate::interceptor::HttpExchange;
use crate::replicator::{ReplicationState, ReplicatorSpec};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result type for collaborator operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Simplified error reported by a document store or replication engine.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Hook invoked by the replication engine on every outbound HTTP exchange.
///
/// The engine must treat the exchange as in flight until the returned
/// future completes; the implementation may mutate the exchange in place.
pub trait HttpInterceptor: Send + Sync + 'static {
    /// Called before the request is sent.
    fn intercept_request<'a>(&'a self, exchange: &'a mut HttpExchange) -> BoxFuture<'a, ()>;

    /// Called after the response has been received.
    fn intercept_response<'a>(&'a self, exchange: &'a mut HttpExchange) -> BoxFuture<'a, ()>;
}

/// Hook invoked by the document store to pick a winner among one document's
/// conflicting revisions.
///
/// Returning `None` abandons resolution; the store leaves the document
/// conflicted.
pub trait ConflictResolver: Send + Sync + 'static {
    fn resolve<'a>(
        &'a self,
        doc_id: &'a str,
        conflicts: Vec<DocumentRevision>,
    ) -> BoxFuture<'a, Option<DocumentRevision>>;
}

/// What the bridge needs from a document store.
pub trait DocumentStore: Send + Sync + 'static {
    /// Enumerate ids of documents that currently have conflicting revisions.
    fn conflicted_document_ids(&self) -> BoxFuture<'_, EngineResult<Vec<String>>>;

    /// Resolve the conflicts of one document.
    ///
    /// The store calls `resolver` with the ordered conflict list and applies
    /// the returned winner (if any). Completes when the store is done.
    fn resolve_conflicts<'a>(
        &'a self,
        doc_id: &'a str,
        resolver: Arc<dyn ConflictResolver>,
    ) -> BoxFuture<'a, EngineResult<()>>;
}

/// A replication task owned by the replication engine.
///
/// The engine drives the state machine; the bridge only starts, stops and
/// observes it.
pub trait ReplicationTask: Send + Sync + 'static {
    /// Begin replicating. Must not block on the replication itself.
    fn start(&self);

    /// Request the task to stop. Must not block until stopped.
    fn stop(&self);

    /// Current externally observable state.
    fn state(&self) -> ReplicationState;
}

/// Everything the engine needs to build one replication task.
pub struct BuildRequest {
    /// Validated replication configuration.
    pub spec: ReplicatorSpec,
    /// Store the task replicates to or from.
    pub store: Arc<dyn DocumentStore>,
    /// Interceptor to install on the task's HTTP client.
    pub interceptor: Arc<dyn HttpInterceptor>,
    /// Receiver for completion and error notifications.
    pub listener: ReplicationListener,
}

/// Builds replication tasks (the replication engine's task builder).
pub trait ReplicatorFactory: Send + Sync + 'static {
    /// Build a task, or reject the configuration.
    fn build(&self, request: BuildRequest) -> EngineResult<Arc<dyn ReplicationTask>>;
}
