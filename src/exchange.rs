// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pending exchange registry.
//!
//! Correlates asynchronous, fire-and-forget decisions with the suspended
//! operation they resume. One registry is shared by every bridge in the
//! process.
//!
//! # Exchange Lifecycle
//!
//! ```text
//!   register()          publish id         resolve(id, d)
//! ─────────────→ Pending ──────────→ (external) ─────────→ Signalled
//!                   │                                         │
//!                   │ wait(id, T) expires                     │ wait() returns d
//!                   ↓                                         ↓
//!               TimedOut ─────────── remove(id) ──────────→ Removed
//! ```
//!
//! The id is inserted before anyone can learn it, so `register` always
//! happens-before the matching `resolve`. Each exchange carries a
//! `tokio::sync::oneshot` pair: `resolve` takes the sender (so at most one
//! decision is accepted) and `wait` takes the receiver. Neither holds a map
//! guard across an `.await`.
//!
//! [`ExchangeLease`] ties removal to the awaiting side: dropping the lease
//! removes the exchange, including when the awaiting future is cancelled.
//!
//! Removed ids are remembered in a bounded ring (the most recent
//! [`RETIRED_CAPACITY`]), so a late post for an exchange that already ended
//! reports `DuplicateResolution` rather than `NotFound`.

use crate::conflict::{ConflictSnapshot, DocumentRevision};
use crate::error::{BridgeError, Result};
use crate::interceptor::{HttpOverride, RequestContext, ResponseContext};
use crate::metrics;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Globally unique identifier of one suspended exchange.
///
/// A fresh random 128-bit value is generated per exchange and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What kind of operation is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExchangeKind {
    /// Outbound HTTP request, before it is sent.
    Request,
    /// HTTP response, after it was received.
    Response,
    /// Conflicting revisions of one document.
    Conflict,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Conflict => "conflict",
        }
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State handed to the external decision-maker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Snapshot {
    #[serde(rename_all = "camelCase")]
    Request {
        request: RequestContext,
        replay_request: bool,
    },
    #[serde(rename_all = "camelCase")]
    Response {
        request: RequestContext,
        response: ResponseContext,
        replay_request: bool,
    },
    Conflict(ConflictSnapshot),
}

impl Snapshot {
    pub fn kind(&self) -> ExchangeKind {
        match self {
            Self::Request { .. } => ExchangeKind::Request,
            Self::Response { .. } => ExchangeKind::Response,
            Self::Conflict(_) => ExchangeKind::Conflict,
        }
    }
}

/// A validated decision posted by the external decision-maker.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Proceed with the original state.
    NoChange,
    /// Override an intercepted HTTP exchange.
    Http(HttpOverride),
    /// Winner of a conflict set; `None` abandons resolution.
    Resolution(Option<DocumentRevision>),
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// A decision was posted.
    Decided(Decision),
    /// The ceiling elapsed without a decision.
    TimedOut,
    /// The exchange was removed while waiting; treated like a timeout.
    Cancelled,
}

impl WaitOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Decided(_) => "decided",
            Self::TimedOut => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One suspended operation.
struct PendingExchange {
    snapshot: Snapshot,
    /// Taken by the first `resolve`.
    signal: Option<oneshot::Sender<Decision>>,
    /// Taken by the single `wait`.
    waiter: Option<oneshot::Receiver<Decision>>,
    registered_at: Instant,
}

/// How many removed ids are remembered for duplicate detection.
pub const RETIRED_CAPACITY: usize = 4096;

/// Bounded memory of recently removed ids, oldest evicted first.
#[derive(Default)]
struct Retired {
    ids: HashSet<CorrelationId>,
    order: VecDeque<CorrelationId>,
}

impl Retired {
    fn insert(&mut self, id: CorrelationId) {
        if !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > RETIRED_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

/// Table of suspended exchanges, keyed by correlation id.
#[derive(Default)]
pub struct ExchangeRegistry {
    pending: DashMap<CorrelationId, PendingExchange>,
    retired: Mutex<Retired>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new exchange with an unsignalled waiter and return its id.
    ///
    /// The id is not visible to anyone until this returns.
    pub fn register(&self, snapshot: Snapshot) -> CorrelationId {
        let kind = snapshot.kind();
        let (signal, waiter) = oneshot::channel();
        let exchange = PendingExchange {
            snapshot,
            signal: Some(signal),
            waiter: Some(waiter),
            registered_at: Instant::now(),
        };

        let id = loop {
            let id = CorrelationId::new();
            match self.pending.entry(id) {
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(exchange);
                    break id;
                }
                // 128-bit collision; draw again
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
            }
        };

        metrics::record_exchange_registered(kind);
        metrics::set_pending_exchanges(self.pending.len());
        debug!(correlation_id = %id, kind = %kind, "Exchange registered");
        id
    }

    /// Register an exchange and return a lease that removes it on drop.
    pub fn lease(self: &Arc<Self>, snapshot: Snapshot) -> ExchangeLease {
        let id = self.register(snapshot);
        ExchangeLease {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Suspend until a decision is posted or `timeout` elapses.
    ///
    /// `None` waits without a ceiling. A timeout does not remove the
    /// exchange; the caller removes it once done (see [`ExchangeLease`]).
    pub async fn wait(&self, id: &CorrelationId, timeout: Option<Duration>) -> Result<WaitOutcome> {
        let (kind, receiver) = {
            let mut exchange = self
                .pending
                .get_mut(id)
                .ok_or_else(|| BridgeError::not_found("exchange", id))?;
            let kind = exchange.snapshot.kind();
            let receiver = exchange.waiter.take().ok_or_else(|| {
                BridgeError::Internal(format!("exchange {} is already being awaited", id))
            })?;
            (kind, receiver)
        };

        let start = Instant::now();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(Ok(decision)) => WaitOutcome::Decided(decision),
                Ok(Err(_)) => WaitOutcome::Cancelled,
                Err(_) => WaitOutcome::TimedOut,
            },
            None => match receiver.await {
                Ok(decision) => WaitOutcome::Decided(decision),
                Err(_) => WaitOutcome::Cancelled,
            },
        };

        metrics::record_decision_wait(kind, outcome.label(), start.elapsed());
        Ok(outcome)
    }

    /// Post a decision and wake the waiter.
    ///
    /// Never blocks. Ids that were never registered report `NotFound`. A
    /// decision for an exchange that already accepted one, whose waiter gave
    /// up, or that was removed reports `DuplicateResolution`; the first
    /// outcome stays in place.
    pub fn resolve(&self, id: &CorrelationId, decision: Decision) -> Result<()> {
        let signal = match self.pending.get_mut(id) {
            Some(mut exchange) => exchange.signal.take(),
            None if self.is_retired(id) => None,
            None => return Err(BridgeError::not_found("exchange", id)),
        };

        let Some(signal) = signal else {
            return Err(self.duplicate(id));
        };

        // The receiver is gone once the waiter gave up
        signal.send(decision).map_err(|_| {
            debug!(correlation_id = %id, "Decision arrived after waiter gave up");
            self.duplicate(id)
        })
    }

    fn duplicate(&self, id: &CorrelationId) -> BridgeError {
        warn!(correlation_id = %id, "Duplicate decision ignored");
        metrics::record_duplicate_decision();
        BridgeError::DuplicateResolution(id.to_string())
    }

    /// Whether `id` belonged to an exchange that was removed recently.
    pub fn is_retired(&self, id: &CorrelationId) -> bool {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .contains(id)
    }

    /// Number of removed ids currently remembered.
    pub fn retired_len(&self) -> usize {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner).order.len()
    }

    /// Remove an exchange. Returns `false` if it was already gone.
    pub fn remove(&self, id: &CorrelationId) -> bool {
        // Held across the removal so a concurrent resolve sees the id in one place or the other
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        match self.pending.remove(id) {
            Some((_, exchange)) => {
                retired.insert(*id);
                drop(retired);
                metrics::set_pending_exchanges(self.pending.len());
                debug!(
                    correlation_id = %id,
                    kind = %exchange.snapshot.kind(),
                    held_ms = u64::try_from(exchange.registered_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Exchange removed"
                );
                true
            }
            None => false,
        }
    }

    /// Kind of a pending exchange.
    pub fn kind(&self, id: &CorrelationId) -> Option<ExchangeKind> {
        self.pending.get(id).map(|e| e.snapshot.kind())
    }

    /// Copy of a pending exchange's snapshot.
    pub fn snapshot(&self, id: &CorrelationId) -> Option<Snapshot> {
        self.pending.get(id).map(|e| e.snapshot.clone())
    }

    /// Whether a decision was already accepted for `id`.
    pub fn is_resolved(&self, id: &CorrelationId) -> Option<bool> {
        self.pending.get(id).map(|e| e.signal.is_none())
    }

    /// Ids of all pending exchanges (point-in-time copy).
    pub fn pending_ids(&self) -> Vec<CorrelationId> {
        self.pending.iter().map(|e| *e.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Ownership of one registered exchange by its awaiting side.
///
/// Dropping the lease removes the exchange, so it cannot be resolved
/// afterwards and does not accumulate.
pub struct ExchangeLease {
    registry: Arc<ExchangeRegistry>,
    id: CorrelationId,
}

impl ExchangeLease {
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Wait for the decision. See [`ExchangeRegistry::wait`].
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<WaitOutcome> {
        self.registry.wait(&self.id, timeout).await
    }
}

impl Drop for ExchangeLease {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
