//! In-memory document store with conflicted documents.
//!
//! Resolution follows the store contract: the resolver gets the ordered
//! conflict list, a returned winner replaces the conflicts, `None` leaves the
//! document conflicted.

use replication_bridge::conflict::DocumentRevision;
use replication_bridge::engine::{BoxFuture, ConflictResolver, DocumentStore, EngineError, EngineResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MemoryStore {
    conflicts: Mutex<BTreeMap<String, Vec<DocumentRevision>>>,
    winners: Mutex<BTreeMap<String, DocumentRevision>>,
    fail_listing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `doc_id` the conflicting revisions `revs` (bodies `{"rev": <rev>}`).
    pub fn with_conflict(self, doc_id: &str, revs: &[&str]) -> Self {
        let revisions = revs
            .iter()
            .map(|rev| DocumentRevision::new(doc_id, *rev).with_body(serde_json::json!({ "rev": rev })))
            .collect();
        self.conflicts.lock().unwrap().insert(doc_id.to_string(), revisions);
        self
    }

    /// Make `conflicted_document_ids` fail.
    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    /// Winner applied for `doc_id`, if any.
    pub fn winner(&self, doc_id: &str) -> Option<DocumentRevision> {
        self.winners.lock().unwrap().get(doc_id).cloned()
    }

    pub fn is_conflicted(&self, doc_id: &str) -> bool {
        self.conflicts.lock().unwrap().contains_key(doc_id)
    }
}

impl DocumentStore for MemoryStore {
    fn conflicted_document_ids(&self) -> BoxFuture<'_, EngineResult<Vec<String>>> {
        Box::pin(async move {
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(EngineError::new("index unavailable"));
            }
            Ok(self.conflicts.lock().unwrap().keys().cloned().collect())
        })
    }

    fn resolve_conflicts<'a>(
        &'a self,
        doc_id: &'a str,
        resolver: Arc<dyn ConflictResolver>,
    ) -> BoxFuture<'a, EngineResult<()>> {
        Box::pin(async move {
            let conflicts = match self.conflicts.lock().unwrap().get(doc_id) {
                Some(conflicts) => conflicts.clone(),
                None => return Ok(()),
            };

            if let Some(winner) = resolver.resolve(doc_id, conflicts).await {
                self.conflicts.lock().unwrap().remove(doc_id);
                self.winners.lock().unwrap().insert(doc_id.to_string(), winner);
            }
            Ok(())
        })
    }
}
