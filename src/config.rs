// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the replication bridge.
//!
//! Configuration is passed to [`BridgeCoordinator::new()`](crate::BridgeCoordinator::new)
//! and can be constructed programmatically or deserialized from YAML/JSON.
//!
//! # Configuration Structure
//!
//! ```text
//! BridgeConfig
//! ├── interceptor: InterceptorConfig  # network exchange interception
//! │   └── decision_timeout: String    # ceiling for each suspended exchange
//! └── conflict: ConflictConfig        # conflict resolution suspension
//!     ├── max_concurrent_resolutions  # resolution pool size
//!     └── unknown_revision            # reject | accept_verbatim
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! interceptor:
//!   decision_timeout: "60s"
//!
//! conflict:
//!   max_concurrent_resolutions: 4
//!   unknown_revision: reject
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ceiling used when `decision_timeout` is missing or unparseable.
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(60);

/// The top-level config object passed to `BridgeCoordinator::new()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Network exchange interception settings.
    #[serde(default)]
    pub interceptor: InterceptorConfig,

    /// Conflict resolution settings.
    #[serde(default)]
    pub conflict: ConflictConfig,
}

impl BridgeConfig {
    /// Create a config with short ceilings for tests.
    pub fn for_testing() -> Self {
        Self {
            interceptor: InterceptorConfig {
                decision_timeout: "200ms".to_string(),
            },
            conflict: ConflictConfig::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// InterceptorConfig: request/response interception
// ═══════════════════════════════════════════════════════════════════════════════

/// Interception bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptorConfig {
    /// How long an intercepted exchange waits for a decision, as a duration
    /// string (e.g., "60s"). On expiry the exchange proceeds unmodified.
    #[serde(default = "default_decision_timeout")]
    pub decision_timeout: String,
}

fn default_decision_timeout() -> String {
    "60s".to_string()
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            decision_timeout: default_decision_timeout(),
        }
    }
}

impl InterceptorConfig {
    /// Parse the decision_timeout string to a Duration.
    pub fn decision_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.decision_timeout).unwrap_or(DEFAULT_DECISION_TIMEOUT)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ConflictConfig: conflict resolution suspension
// ═══════════════════════════════════════════════════════════════════════════════

/// What to do when a posted resolution names a revision that was not offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRevisionPolicy {
    /// Log the mismatch and abandon the resolution.
    #[default]
    Reject,
    /// Log the mismatch and hand the posted revision to the store unchanged.
    AcceptVerbatim,
}

/// Conflict resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Maximum number of documents whose resolution may be suspended at once.
    /// Further requests queue until a slot frees up.
    #[serde(default = "default_max_concurrent_resolutions")]
    pub max_concurrent_resolutions: usize,

    /// Handling of resolutions that name an unknown revision.
    #[serde(default)]
    pub unknown_revision: UnknownRevisionPolicy,
}

fn default_max_concurrent_resolutions() -> usize {
    4
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            max_concurrent_resolutions: default_max_concurrent_resolutions(),
            unknown_revision: UnknownRevisionPolicy::default(),
        }
    }
}
