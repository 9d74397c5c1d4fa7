// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded pool for conflict resolutions.
//!
//! A resolution may stay suspended indefinitely, so resolutions never run
//! inline on a caller's task. Each one is spawned onto the runtime and first
//! takes a permit from a semaphore sized by
//! `conflict.max_concurrent_resolutions`; once all permits are held, further
//! resolutions queue until a slot frees up. Control operations never touch
//! the pool, so a stalled resolution cannot block `destroy` or a post.

use crate::metrics;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

/// Concurrency limiter for conflict resolutions.
#[derive(Debug, Clone)]
pub struct ResolutionPool {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ResolutionPool {
    /// Create a pool with `max_concurrent` slots (at least one).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Run `resolution` once a slot is free.
    ///
    /// The slot is held until the future completes or the task is aborted.
    pub fn spawn<F, T>(&self, resolution: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let max_concurrent = self.max_concurrent;
        tokio::spawn(async move {
            // Only fails if the semaphore was closed, which this pool never does
            let permit = semaphore.clone().acquire_owned().await.ok()?;
            metrics::set_active_resolutions(max_concurrent - semaphore.available_permits());

            let output = resolution.await;

            drop(permit);
            metrics::set_active_resolutions(max_concurrent - semaphore.available_permits());
            debug!("Resolution slot released");
            Some(output)
        })
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Whether every slot is held.
    pub fn is_full(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}
