// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replicator identity, configuration and state types.
//!
//! # State Transitions
//!
//! The replication engine drives the state machine; the registry only
//! reports it.
//!
//! ```text
//!             start()
//! Pending ─────────────→ Started
//!                           │
//!          ┌────────────────┼─────────────────┐
//!          │ stop()         │ (finished)      │ (failed)
//!          ↓                ↓                 ↓
//!       Stopping         Complete           Error
//!          │
//!          ↓
//!       Stopped
//! ```

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

/// Caller-supplied key of a live replicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicatorToken(i64);

impl ReplicatorToken {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ReplicatorToken {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ReplicatorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally observed state of a replication task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationState {
    /// Built but not started.
    Pending,
    /// Replicating.
    Started,
    /// Stop requested, not yet stopped.
    Stopping,
    /// Stopped before completion.
    Stopped,
    /// Finished successfully.
    Complete,
    /// Failed.
    Error,
}

impl ReplicationState {
    /// Whether the task can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Complete | Self::Error)
    }
}

impl std::fmt::Display for ReplicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationState::Pending => write!(f, "Pending"),
            ReplicationState::Started => write!(f, "Started"),
            ReplicationState::Stopping => write!(f, "Stopping"),
            ReplicationState::Stopped => write!(f, "Stopped"),
            ReplicationState::Complete => write!(f, "Complete"),
            ReplicationState::Error => write!(f, "Error"),
        }
    }
}

/// Which way documents flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationDirection {
    /// Local store to remote.
    Push,
    /// Remote to local store.
    Pull,
}

impl FromStr for ReplicationDirection {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            other => Err(BridgeError::Construction(format!(
                "replicator type must be either 'push' or 'pull', received: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ReplicationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationDirection::Push => write!(f, "push"),
            ReplicationDirection::Pull => write!(f, "pull"),
        }
    }
}

/// Validated configuration of one replicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicatorSpec {
    /// Name of the local store in the [`StoreRegistry`](crate::store::StoreRegistry).
    pub store_name: String,
    /// Remote database.
    pub remote_url: Url,
    pub direction: ReplicationDirection,
}

impl ReplicatorSpec {
    /// Validate raw creation parameters.
    pub fn parse(store_name: &str, remote_url: &str, direction: &str) -> Result<Self> {
        if store_name.is_empty() {
            return Err(BridgeError::Construction("store name must not be empty".to_string()));
        }
        let remote_url = Url::parse(remote_url)
            .map_err(|e| BridgeError::Construction(format!("invalid uri {}: {}", remote_url, e)))?;
        let direction = direction.parse()?;
        Ok(Self {
            store_name: store_name.to_string(),
            remote_url,
            direction,
        })
    }

    /// Remote url with any password masked, for logging.
    pub fn redacted_url(&self) -> Url {
        let mut url = self.remote_url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("****"));
        }
        url
    }
}
