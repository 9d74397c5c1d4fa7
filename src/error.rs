// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replication bridge.
//!
//! Every failure in the bridge layer is local and recoverable: the worst
//! outcome is a stalled conflict resolution or an unmodified network
//! exchange. Errors are reported back to the immediate caller and never
//! crash the process.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `NotFound` | No | Unknown token, store, correlation or resolver id |
//! | `Timeout` | Yes | Interceptor decision did not arrive within the ceiling |
//! | `MalformedDecision` | No | Posted decision missing fields or naming an unknown revision |
//! | `DuplicateResolution` | No | Decision posted for an id that was already resolved or removed |
//! | `Construction` | No | Replication configuration rejected, no token allocated |
//! | `TokenInUse` | No | Token already names a live replicator |
//! | `InvalidCommand` | No | Typed command failed boundary validation |
//! | `Engine` | Yes | Document store or replication engine reported a failure |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! Use [`BridgeError::is_retryable()`] to decide whether the operation may
//! be attempted again. [`BridgeError::error_type()`] yields a stable label
//! used for the `bridge_errors_total` metric.

use crate::engine::EngineError;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the bridge layer.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Lookup of an unknown key.
    ///
    /// `what` names the key space ("replicator", "datastore", "exchange",
    /// "resolver") and `id` the key that was not found.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// An interceptor decision did not arrive within its ceiling.
    ///
    /// The exchange proceeds unmodified (fail-open).
    #[error("Decision for exchange {id} timed out after {waited_ms}ms")]
    Timeout { id: String, waited_ms: u64 },

    /// An externally posted decision is missing required fields or
    /// references a revision that was never offered.
    #[error("Malformed decision for {id}: {reason}")]
    MalformedDecision { id: String, reason: String },

    /// A decision was posted for an exchange that already accepted one or
    /// has ended (timed out, consumed, removed).
    ///
    /// The waiter that was already resumed is unaffected.
    #[error("Exchange {0} already resolved or removed")]
    DuplicateResolution(String),

    /// The replication configuration was rejected.
    ///
    /// Nothing is stored under the requested token.
    #[error("Replicator construction failed: {0}")]
    Construction(String),

    /// The requested token already names a live replicator.
    #[error("Replicator token {0} is already in use")]
    TokenInUse(i64),

    /// A command failed validation at the boundary.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A collaborator (document store or replication engine) failed.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Create a not-found error for the given key space.
    pub fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Create a malformed-decision error.
    pub fn malformed(id: impl ToString, reason: impl Into<String>) -> Self {
        Self::MalformedDecision {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound { .. } => false,
            Self::Timeout { .. } => true,
            Self::MalformedDecision { .. } => false,
            Self::DuplicateResolution(_) => false,
            Self::Construction(_) => false,
            Self::TokenInUse(_) => false,
            Self::InvalidCommand(_) => false,
            Self::Engine(_) => true,
            Self::Internal(_) => false,
        }
    }

    /// Stable label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Timeout { .. } => "timeout",
            Self::MalformedDecision { .. } => "malformed_decision",
            Self::DuplicateResolution(_) => "duplicate_resolution",
            Self::Construction(_) => "construction",
            Self::TokenInUse(_) => "token_in_use",
            Self::InvalidCommand(_) => "invalid_command",
            Self::Engine(_) => "engine",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_formatting() {
        let err = BridgeError::not_found("replicator", 42);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "replicator not found: 42");
        assert_eq!(err.error_type(), "not_found");
    }

    #[test]
    fn test_is_retryable_timeout() {
        let err = BridgeError::Timeout {
            id: "abc".to_string(),
            waited_ms: 60_000,
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("60000ms"));
    }

    #[test]
    fn test_is_retryable_engine() {
        let err = BridgeError::Engine(EngineError("store closed".to_string()));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("store closed"));
    }

    #[test]
    fn test_not_retryable_malformed() {
        let err = BridgeError::malformed("id-1", "missing replayRequest");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("missing replayRequest"));
    }

    #[test]
    fn test_not_retryable_duplicate() {
        let err = BridgeError::DuplicateResolution("id-2".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.error_type(), "duplicate_resolution");
    }

    #[test]
    fn test_not_retryable_construction() {
        let err = BridgeError::Construction("unknown direction: sideways".to_string());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn test_token_in_use_formatting() {
        let err = BridgeError::TokenInUse(7);
        assert_eq!(err.to_string(), "Replicator token 7 is already in use");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_types_are_distinct() {
        let errors = [
            BridgeError::not_found("exchange", "x"),
            BridgeError::Timeout { id: "x".into(), waited_ms: 1 },
            BridgeError::malformed("x", "y"),
            BridgeError::DuplicateResolution("x".into()),
            BridgeError::Construction("x".into()),
            BridgeError::TokenInUse(1),
            BridgeError::InvalidCommand("x".into()),
            BridgeError::Engine(EngineError("x".into())),
            BridgeError::Internal("x".into()),
        ];
        let mut labels: Vec<_> = errors.iter().map(|e| e.error_type()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), errors.len());
    }
}
