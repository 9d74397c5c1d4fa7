// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Typed commands from the decision-maker's host.
//!
//! One variant per operation, tagged by `"action"`:
//!
//! ```json
//! {"action": "createReplicator", "token": 42, "storeName": "animaldb",
//!  "uri": "https://host/animaldb", "type": "pull"}
//! {"action": "unlockInterceptor", "token": 42,
//!  "correlationId": "6f1c...", "decision": {"replayRequest": false}}
//! {"action": "returnResolvedDocument", "resolverId": "9a2e...",
//!  "revision": {"_id": "doc1", "_rev": "1-b", "x": 1}}
//! ```
//!
//! The envelope (action, tokens, ids) is validated while parsing. Decision
//! payloads (`decision`, `revision`) travel as raw JSON and are typed by the
//! bridge that owns the exchange, so a malformed decision still resumes the
//! operation it was meant for instead of being dropped here.

use crate::error::{BridgeError, Result};
use crate::exchange::CorrelationId;
use crate::replicator::{ReplicationState, ReplicatorToken};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BridgeCommand {
    #[serde(rename_all = "camelCase")]
    CreateReplicator {
        token: ReplicatorToken,
        store_name: String,
        uri: String,
        /// `push` or `pull`.
        #[serde(rename = "type")]
        direction: String,
    },
    StartReplication {
        token: ReplicatorToken,
    },
    StopReplication {
        token: ReplicatorToken,
    },
    GetReplicationStatus {
        token: ReplicatorToken,
    },
    DestroyReplicator {
        token: ReplicatorToken,
    },
    /// Post an interceptor decision. A missing `decision` resumes the
    /// exchange unmodified.
    #[serde(rename_all = "camelCase")]
    UnlockInterceptor {
        token: ReplicatorToken,
        correlation_id: CorrelationId,
        /// Shaped like [`InterceptorDecision`](crate::interceptor::InterceptorDecision).
        #[serde(default)]
        decision: Option<Value>,
        /// How long the decision-maker spent before giving up.
        #[serde(default)]
        elapsed_ms: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    GetConflictedDocumentIds {
        store_name: String,
    },
    #[serde(rename_all = "camelCase")]
    ResolveConflictsForDocument {
        store_name: String,
        doc_id: String,
    },
    /// Post a conflict resolution. A missing `revision` abandons it.
    #[serde(rename_all = "camelCase")]
    ReturnResolvedDocument {
        resolver_id: CorrelationId,
        /// Shaped like [`DocumentRevision`](crate::conflict::DocumentRevision).
        #[serde(default)]
        revision: Option<Value>,
    },
}

impl BridgeCommand {
    /// Parse a JSON command. Any parse failure is `InvalidCommand`.
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| BridgeError::InvalidCommand(e.to_string()))
    }

    /// The action name, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            Self::CreateReplicator { .. } => "createReplicator",
            Self::StartReplication { .. } => "startReplication",
            Self::StopReplication { .. } => "stopReplication",
            Self::GetReplicationStatus { .. } => "getReplicationStatus",
            Self::DestroyReplicator { .. } => "destroyReplicator",
            Self::UnlockInterceptor { .. } => "unlockInterceptor",
            Self::GetConflictedDocumentIds { .. } => "getConflictedDocumentIds",
            Self::ResolveConflictsForDocument { .. } => "resolveConflictsForDocument",
            Self::ReturnResolvedDocument { .. } => "returnResolvedDocument",
        }
    }
}

/// Result of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", content = "value", rename_all = "camelCase")]
pub enum CommandReply {
    Done,
    State(ReplicationState),
    DocumentIds(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_replicator() {
        let command = BridgeCommand::from_json(
            r#"{"action":"createReplicator","token":42,"storeName":"animaldb","uri":"http://h/db","type":"pull"}"#,
        )
        .unwrap();
        assert_eq!(
            command,
            BridgeCommand::CreateReplicator {
                token: ReplicatorToken::new(42),
                store_name: "animaldb".to_string(),
                uri: "http://h/db".to_string(),
                direction: "pull".to_string(),
            }
        );
        assert_eq!(command.action(), "createReplicator");
    }

    #[test]
    fn test_parse_unlock_without_decision() {
        let id = CorrelationId::new();
        let input = format!(
            r#"{{"action":"unlockInterceptor","token":1,"correlationId":"{}","elapsedMs":290000}}"#,
            id
        );
        match BridgeCommand::from_json(&input).unwrap() {
            BridgeCommand::UnlockInterceptor {
                correlation_id,
                decision,
                elapsed_ms,
                ..
            } => {
                assert_eq!(correlation_id, id);
                assert!(decision.is_none());
                assert_eq!(elapsed_ms, Some(290_000));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_return_resolved_document() {
        let id = CorrelationId::new();
        let input = format!(
            r#"{{"action":"returnResolvedDocument","resolverId":"{}","revision":{{"_id":"d","_rev":"1-b","x":1}}}}"#,
            id
        );
        match BridgeCommand::from_json(&input).unwrap() {
            BridgeCommand::ReturnResolvedDocument { resolver_id, revision } => {
                assert_eq!(resolver_id, id);
                let revision = revision.unwrap();
                assert_eq!(revision["_rev"], "1-b");
                assert_eq!(revision["x"], 1);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_null_revision_abandons() {
        let input = format!(
            r#"{{"action":"returnResolvedDocument","resolverId":"{}","revision":null}}"#,
            CorrelationId::new()
        );
        assert!(matches!(
            BridgeCommand::from_json(&input).unwrap(),
            BridgeCommand::ReturnResolvedDocument { revision: None, .. }
        ));
    }

    #[test]
    fn test_malformed_payloads_reach_the_bridges() {
        // Missing `_rev` and mistyped fields do not fail the envelope
        let input = format!(
            r#"{{"action":"returnResolvedDocument","resolverId":"{}","revision":{{"_id":"doc1","x":1}}}}"#,
            CorrelationId::new()
        );
        assert!(matches!(
            BridgeCommand::from_json(&input).unwrap(),
            BridgeCommand::ReturnResolvedDocument { revision: Some(_), .. }
        ));

        let input = format!(
            r#"{{"action":"unlockInterceptor","token":1,"correlationId":"{}","decision":{{"replayRequest":"yes"}}}}"#,
            CorrelationId::new()
        );
        assert!(matches!(
            BridgeCommand::from_json(&input).unwrap(),
            BridgeCommand::UnlockInterceptor { decision: Some(_), .. }
        ));
    }

    #[test]
    fn test_unknown_action_is_invalid() {
        assert!(matches!(
            BridgeCommand::from_json(r#"{"action":"dropDatabase","token":1}"#),
            Err(BridgeError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_missing_field_is_invalid() {
        assert!(matches!(
            BridgeCommand::from_json(r#"{"action":"startReplication"}"#),
            Err(BridgeError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_bad_correlation_id_is_invalid() {
        assert!(BridgeCommand::from_json(
            r#"{"action":"unlockInterceptor","token":1,"correlationId":"nope"}"#
        )
        .is_err());
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(BridgeCommand::from_json("not json").is_err());
        assert!(BridgeCommand::from_json("").is_err());
    }

    #[test]
    fn test_reply_shape() {
        let json = serde_json::to_value(CommandReply::State(ReplicationState::Stopping)).unwrap();
        assert_eq!(json["reply"], "state");
        assert_eq!(json["value"], "Stopping");
        let json = serde_json::to_value(CommandReply::Done).unwrap();
        assert_eq!(json["reply"], "done");
    }
}
