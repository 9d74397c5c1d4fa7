// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Conflict resolution bridge.
//!
//! Installed as the document store's conflict resolver. For one document it
//! hands the ordered list of conflicting revisions to the decision-maker and
//! suspends, without a ceiling, until a winner (or abandonment) is posted
//! for the resolver id.
//!
//! # Selecting the Winner
//!
//! ```text
//! posted None                     → abandon (store keeps the conflict)
//! posted rev matches candidate    → candidate with posted body/attachments
//! posted rev matches no candidate → UnknownRevisionPolicy:
//!                                     Reject         → abandon
//!                                     AcceptVerbatim → posted revision as-is
//! ```
//!
//! Resolutions hold their task until decided, so they run on a
//! [`ResolutionPool`] rather than on the caller.

mod pool;
mod revision;

pub use pool::ResolutionPool;
pub use revision::{Attachment, ConflictSnapshot, DocumentRevision, RevisionSnapshot};

use crate::config::UnknownRevisionPolicy;
use crate::engine::{BoxFuture, ConflictResolver};
use crate::error::{BridgeError, Result};
use crate::events::{BridgeEvent, EventSink};
use crate::exchange::{CorrelationId, Decision, ExchangeKind, ExchangeRegistry, Snapshot, WaitOutcome};
use crate::metrics;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Conflict resolver backed by the external decision-maker.
pub struct ConflictBridge {
    exchanges: Arc<ExchangeRegistry>,
    sink: Arc<dyn EventSink>,
    unknown_revision: UnknownRevisionPolicy,
}

impl ConflictBridge {
    pub fn new(
        exchanges: Arc<ExchangeRegistry>,
        sink: Arc<dyn EventSink>,
        unknown_revision: UnknownRevisionPolicy,
    ) -> Self {
        Self {
            exchanges,
            sink,
            unknown_revision,
        }
    }

    pub fn unknown_revision_policy(&self) -> UnknownRevisionPolicy {
        self.unknown_revision
    }

    /// Suspend until the decision-maker picks a winner for `doc_id`.
    ///
    /// Returns `None` when resolution is abandoned.
    pub async fn resolve(&self, doc_id: &str, conflicts: Vec<DocumentRevision>) -> Option<DocumentRevision> {
        let snapshot = ConflictSnapshot::new(doc_id, &conflicts);
        let lease = self.exchanges.lease(Snapshot::Conflict(snapshot.clone()));
        let resolver_id = lease.id();

        info!(
            doc_id,
            resolver_id = %resolver_id,
            conflicts = conflicts.len(),
            "Waiting for conflict resolution"
        );
        self.sink.publish(BridgeEvent::ConflictsPending {
            resolver_id,
            snapshot,
        });

        let posted = match lease.wait(None).await {
            Ok(WaitOutcome::Decided(Decision::Resolution(posted))) => posted,
            Ok(WaitOutcome::Decided(other)) => {
                warn!(doc_id, resolver_id = %resolver_id, decision = ?other, "Unexpected decision for conflict");
                None
            }
            Ok(outcome) => {
                warn!(doc_id, resolver_id = %resolver_id, outcome = outcome.label(), "Conflict resolution interrupted");
                None
            }
            Err(e) => {
                error!(doc_id, resolver_id = %resolver_id, error = %e, "Conflict wait failed");
                None
            }
        };
        drop(lease);

        self.select_winner(doc_id, conflicts, posted)
    }

    fn select_winner(
        &self,
        doc_id: &str,
        mut conflicts: Vec<DocumentRevision>,
        posted: Option<DocumentRevision>,
    ) -> Option<DocumentRevision> {
        let Some(posted) = posted else {
            info!(doc_id, "Conflict resolution abandoned");
            metrics::record_conflict_resolution("abandoned");
            return None;
        };

        if let Some(index) = conflicts.iter().position(|c| c.rev_id == posted.rev_id) {
            let mut winner = conflicts.swap_remove(index);
            winner.body = posted.body;
            winner.attachments = posted.attachments;
            info!(doc_id, rev = %winner.rev_id, "Conflict resolved");
            metrics::record_conflict_resolution("winner");
            return Some(winner);
        }

        let e = BridgeError::malformed(
            doc_id,
            format!("revision {} is not among {} conflicts", posted.rev_id, conflicts.len()),
        );
        error!(doc_id, error = %e, policy = ?self.unknown_revision, "Unable to find posted revision in conflicts");
        metrics::record_malformed_decision(ExchangeKind::Conflict);
        metrics::record_error(e.error_type());
        match self.unknown_revision {
            UnknownRevisionPolicy::Reject => {
                metrics::record_conflict_resolution("mismatch_rejected");
                None
            }
            UnknownRevisionPolicy::AcceptVerbatim => {
                metrics::record_conflict_resolution("mismatch_accepted");
                Some(posted)
            }
        }
    }

    /// Post the decision for a suspended conflict set.
    ///
    /// `None` abandons resolution. Ids that are unknown or not conflict
    /// exchanges report `NotFound`; resolutions that already ended report
    /// `DuplicateResolution`.
    pub fn post_resolution(&self, resolver_id: &CorrelationId, revision: Option<DocumentRevision>) -> Result<()> {
        self.check_resolver(resolver_id)?;
        debug!(
            resolver_id = %resolver_id,
            rev = revision.as_ref().map(|r| r.rev_id.as_str()),
            "Resolution posted"
        );
        self.exchanges.resolve(resolver_id, Decision::Resolution(revision))
    }

    /// Post a resolution as received from the host, before it is typed.
    ///
    /// `null` abandons. A payload that is not a revision (for example one
    /// without `_rev`) is malformed: logged, and the resolution is abandoned
    /// so the document stays conflicted and its pool slot is freed.
    pub fn post_raw_resolution(&self, resolver_id: &CorrelationId, revision: Option<Value>) -> Result<()> {
        let parsed = revision
            .filter(|value| !value.is_null())
            .map(serde_json::from_value::<DocumentRevision>)
            .transpose();
        let revision = match parsed {
            Ok(revision) => revision,
            Err(e) => {
                self.check_resolver(resolver_id)?;
                let e = BridgeError::malformed(resolver_id, e.to_string());
                warn!(error = %e, "Abandoning conflict resolution");
                metrics::record_malformed_decision(ExchangeKind::Conflict);
                metrics::record_error(e.error_type());
                None
            }
        };
        self.post_resolution(resolver_id, revision)
    }

    fn check_resolver(&self, resolver_id: &CorrelationId) -> Result<()> {
        match self.exchanges.kind(resolver_id) {
            Some(ExchangeKind::Conflict) => Ok(()),
            Some(_) => Err(BridgeError::not_found("resolver", resolver_id)),
            None if self.exchanges.is_retired(resolver_id) => {
                metrics::record_duplicate_decision();
                Err(BridgeError::DuplicateResolution(resolver_id.to_string()))
            }
            None => Err(BridgeError::not_found("resolver", resolver_id)),
        }
    }

    /// Resolver ids currently waiting for a decision.
    pub fn pending_resolver_ids(&self) -> Vec<CorrelationId> {
        self.exchanges
            .pending_ids()
            .into_iter()
            .filter(|id| self.exchanges.kind(id) == Some(ExchangeKind::Conflict))
            .collect()
    }
}

impl ConflictResolver for ConflictBridge {
    fn resolve<'a>(
        &'a self,
        doc_id: &'a str,
        conflicts: Vec<DocumentRevision>,
    ) -> BoxFuture<'a, Option<DocumentRevision>> {
        Box::pin(ConflictBridge::resolve(self, doc_id, conflicts))
    }
}
