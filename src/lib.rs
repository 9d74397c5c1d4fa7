//! # Replication Bridge
//!
//! Lets a remote decision-maker override a replication engine's network
//! exchanges and conflict resolutions, communicating only through
//! fire-and-forget messages.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                           replication-bridge                              │
//! │                                                                           │
//! │  ┌──────────────────┐   ┌────────────────────┐   ┌─────────────────────┐  │
//! │  │ Replicators      │──►│ InterceptionBridge │──►│                     │  │
//! │  │ (token → task)   │   │ (bounded wait)     │   │  ExchangeRegistry   │  │
//! │  └──────────────────┘   └────────────────────┘   │  (correlation id →  │  │
//! │                                                  │   oneshot pair)     │  │
//! │  ┌──────────────────┐   ┌────────────────────┐   │                     │  │
//! │  │ ResolutionPool   │──►│ ConflictBridge     │──►│                     │  │
//! │  │ (bounded slots)  │   │ (unbounded wait)   │   └─────────────────────┘  │
//! │  └──────────────────┘   └────────────────────┘             │              │
//! │                                                             ▼              │
//! │                                                   BridgeEvent → EventSink  │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Suspend / Resume
//!
//! 1. A bridge registers a snapshot and gets a fresh correlation id
//! 2. It publishes the snapshot and id as a [`BridgeEvent`]
//! 3. It suspends until a decision is posted for that id (or the ceiling passes)
//! 4. The host posts the decision from any thread; the bridge resumes
//!
//! Interceptors fail open: on timeout the exchange proceeds unmodified.
//! Conflict resolutions wait without a ceiling.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replication_bridge::{BridgeConfig, BridgeCoordinator, BridgeEvent};
//! use replication_bridge::engine::{BuildRequest, EngineResult, ReplicationTask, ReplicatorFactory};
//! use replication_bridge::replicator::ReplicationState;
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! struct IdleTask;
//! impl ReplicationTask for IdleTask {
//!     fn start(&self) {}
//!     fn stop(&self) {}
//!     fn state(&self) -> ReplicationState { ReplicationState::Pending }
//! }
//!
//! struct IdleFactory;
//! impl ReplicatorFactory for IdleFactory {
//!     fn build(&self, _request: BuildRequest) -> EngineResult<Arc<dyn ReplicationTask>> {
//!         Ok(Arc::new(IdleTask))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (events, mut rx) = mpsc::unbounded_channel::<BridgeEvent>();
//!     let coordinator = BridgeCoordinator::new(BridgeConfig::default(), Arc::new(IdleFactory), Arc::new(events));
//!
//!     // Commands arrive from the host as JSON
//!     let reply = coordinator
//!         .execute_json(r#"{"action":"getReplicationStatus","token":42}"#)
//!         .await;
//!     assert!(reply.is_err()); // no replicator 42 yet
//!
//!     while let Some(event) = rx.recv().await {
//!         println!("{}", serde_json::to_string(&event).unwrap());
//!     }
//! }
//! ```

pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod exchange;
pub mod interceptor;
pub mod metrics;
pub mod replicator;
pub mod store;

// Re-exports for convenience
pub use config::{BridgeConfig, ConflictConfig, InterceptorConfig, UnknownRevisionPolicy};
pub use conflict::{Attachment, ConflictBridge, ConflictSnapshot, DocumentRevision, ResolutionPool};
pub use coordinator::{BridgeCommand, BridgeCoordinator, BridgeHealth, CommandReply};
pub use engine::{ConflictResolver, DocumentStore, EngineError, HttpInterceptor, ReplicationTask, ReplicatorFactory};
pub use error::{BridgeError, Result};
pub use events::{BridgeEvent, EventSink, NoOpEventSink, ReplicationListener};
pub use exchange::{CorrelationId, Decision, ExchangeKind, ExchangeRegistry, Snapshot, WaitOutcome};
pub use interceptor::{HttpExchange, InterceptionBridge, InterceptorDecision};
pub use replicator::{ReplicationDirection, ReplicationState, ReplicatorRegistry, ReplicatorSpec, ReplicatorToken};
pub use store::StoreRegistry;
