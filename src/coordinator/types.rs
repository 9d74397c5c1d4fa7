// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Coordinator health snapshot.

use serde::Serialize;

/// Point-in-time view of the bridge's shared state.
///
/// # Example
///
/// ```rust,ignore
/// let health = coordinator.health();
/// if health.resolution_pool_saturated() {
///     tracing::warn!(pending = health.pending_resolutions, "All resolution slots are held");
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeHealth {
    /// Replicators currently registered.
    pub live_replicators: usize,
    /// Registered document stores.
    pub stores: usize,
    /// Interceptor exchanges waiting for a decision.
    pub pending_interceptions: usize,
    /// Conflict sets waiting for a resolution.
    pub pending_resolutions: usize,
    /// Free resolution pool slots.
    pub resolution_slots_available: usize,
    /// Resolution pool size.
    pub resolution_slots_total: usize,
}

impl BridgeHealth {
    /// Every resolution slot is held; new resolutions queue.
    pub fn resolution_pool_saturated(&self) -> bool {
        self.resolution_slots_available == 0
    }

    /// Nothing is suspended.
    pub fn is_idle(&self) -> bool {
        self.pending_interceptions == 0 && self.pending_resolutions == 0
    }
}
