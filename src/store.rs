// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Named document stores.
//!
//! The host opens stores and registers them here under a name; replicators
//! and conflict operations look them up by that name.

use crate::engine::DocumentStore;
use crate::error::{BridgeError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Map of store name to store handle.
#[derive(Default)]
pub struct StoreRegistry {
    stores: DashMap<String, Arc<dyn DocumentStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store, replacing any previous one with the same name.
    pub fn register(&self, name: impl Into<String>, store: Arc<dyn DocumentStore>) {
        let name = name.into();
        let replaced = self.stores.insert(name.clone(), store).is_some();
        info!(store = %name, replaced, "Document store registered");
    }

    /// Look up a store by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn DocumentStore>> {
        self.stores
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BridgeError::not_found("datastore", name))
    }

    /// Forget a store. Replicators already built keep their handle.
    pub fn remove(&self, name: &str) -> Result<()> {
        self.stores
            .remove(name)
            .map(|_| info!(store = %name, "Document store removed"))
            .ok_or_else(|| BridgeError::not_found("datastore", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Registered store names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BoxFuture, ConflictResolver, EngineResult};

    struct EmptyStore;

    impl DocumentStore for EmptyStore {
        fn conflicted_document_ids(&self) -> BoxFuture<'_, EngineResult<Vec<String>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn resolve_conflicts<'a>(
            &'a self,
            _doc_id: &'a str,
            _resolver: Arc<dyn ConflictResolver>,
        ) -> BoxFuture<'a, EngineResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn test_register_and_get() {
        let stores = StoreRegistry::new();
        stores.register("animaldb", Arc::new(EmptyStore));
        assert!(stores.get("animaldb").is_ok());
        assert!(stores.contains("animaldb"));
        assert_eq!(stores.names(), vec!["animaldb".to_string()]);
    }

    #[test]
    fn test_unknown_store() {
        let stores = StoreRegistry::new();
        match stores.get("missing") {
            Err(BridgeError::NotFound { what, id }) => {
                assert_eq!(what, "datastore");
                assert_eq!(id, "missing");
            }
            _ => panic!("expected NotFound"),
        }
    }

    #[test]
    fn test_remove() {
        let stores = StoreRegistry::new();
        stores.register("a", Arc::new(EmptyStore));
        stores.remove("a").unwrap();
        assert!(stores.is_empty());
        assert!(stores.remove("a").is_err());
    }
}
