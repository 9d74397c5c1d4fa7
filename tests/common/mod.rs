//! Shared test utilities for integration, property and chaos tests.
//!
//! This module provides:
//! - A scripted replication engine (tasks driven by the test)
//! - An in-memory conflicted document store
//! - An event stream reader for the decision-maker side

#![allow(dead_code)]

pub mod events;
pub mod mock_engine;
pub mod mock_store;

pub use events::*;
pub use mock_engine::*;
pub use mock_store::*;

use replication_bridge::{BridgeConfig, BridgeCoordinator, BridgeEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Coordinator wired to a scripted engine and an event stream.
pub struct Harness {
    pub coordinator: Arc<BridgeCoordinator>,
    pub factory: Arc<ScriptedFactory>,
    pub events: EventStream,
}

impl Harness {
    pub fn new(config: BridgeConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<BridgeEvent>();
        let factory = Arc::new(ScriptedFactory::new());
        let coordinator = Arc::new(BridgeCoordinator::new(
            config,
            Arc::clone(&factory) as Arc<dyn replication_bridge::ReplicatorFactory>,
            Arc::new(tx),
        ));
        Self {
            coordinator,
            factory,
            events: EventStream::new(rx),
        }
    }

    /// Harness with short ceilings and an empty store named `animaldb`.
    pub fn for_testing() -> Self {
        let harness = Self::new(BridgeConfig::for_testing());
        harness
            .coordinator
            .register_store("animaldb", Arc::new(MemoryStore::new()));
        harness
    }
}
