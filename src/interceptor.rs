// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Request/response interception bridge.
//!
//! Installed on a replication task as its HTTP interceptor. Around every
//! outbound exchange it:
//!
//! 1. Builds a snapshot (headers, url, replay flag, and the response for
//!    response interception)
//! 2. Registers it in the shared [`ExchangeRegistry`]
//! 3. Publishes [`BridgeEvent::Intercept`] with the correlation id
//! 4. Suspends for at most `decision_timeout` (60s by default)
//! 5. Applies the posted decision, or proceeds unmodified
//!
//! # Decision Rules
//!
//! | Exchange | Decision may change |
//! |----------|---------------------|
//! | Request | headers (full replace), url, replay flag |
//! | Response | replay flag only |
//!
//! Timeouts, cancelled waits and malformed decisions all degrade to an
//! unmodified passthrough. Once the bridge is closed (its replicator was
//! destroyed) every exchange passes through without being suspended.

use crate::engine::{BoxFuture, HttpInterceptor};
use crate::error::{BridgeError, Result};
use crate::events::{BridgeEvent, EventSink};
use crate::exchange::{CorrelationId, Decision, ExchangeKind, ExchangeRegistry, Snapshot, WaitOutcome};
use crate::metrics;
use crate::replicator::ReplicatorToken;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// HTTP header map (name -> comma-joined value).
pub type Headers = BTreeMap<String, String>;

/// An in-flight HTTP exchange owned by the replication engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpExchange {
    pub url: Url,
    pub request_headers: Headers,
    /// Present once the response has been received.
    pub response: Option<HttpResponse>,
    /// Whether the engine should send the request again.
    pub replay_request: bool,
}

impl HttpExchange {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            request_headers: Headers::new(),
            response: None,
            replay_request: false,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_response(mut self, status_code: u16, headers: Headers) -> Self {
        self.response = Some(HttpResponse {
            status_code,
            headers,
        });
        self
    }

    fn request_context(&self) -> RequestContext {
        RequestContext {
            headers: self.request_headers.clone(),
            url: self.url.to_string(),
        }
    }
}

/// Status and headers of a received response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Headers,
}

/// Request half of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub headers: Headers,
    pub url: String,
}

/// Response half of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseContext {
    pub status_code: u16,
    pub headers: Headers,
}

impl From<&HttpResponse> for ResponseContext {
    fn from(response: &HttpResponse) -> Self {
        Self {
            status_code: response.status_code,
            headers: response.headers.clone(),
        }
    }
}

/// A decision as posted by the decision-maker, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorDecision {
    #[serde(default)]
    pub request: Option<RequestPatch>,
    #[serde(default)]
    pub replay_request: Option<bool>,
}

/// Request fields the decision-maker may rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPatch {
    #[serde(default)]
    pub headers: Option<Headers>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A validated override for one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpOverride {
    /// Replacement request headers (request interception only).
    pub headers: Option<Headers>,
    /// Replacement url (request interception only).
    pub url: Option<Url>,
    pub replay_request: bool,
}

impl InterceptorDecision {
    /// Check the decision has the fields required for `kind`.
    ///
    /// Request decisions need `request.headers` and `replayRequest`;
    /// response decisions need `replayRequest` and ignore `request`.
    pub fn validate(self, kind: ExchangeKind) -> std::result::Result<HttpOverride, String> {
        let replay_request = self
            .replay_request
            .ok_or_else(|| "missing replayRequest".to_string())?;

        match kind {
            ExchangeKind::Request => {
                let request = self.request.ok_or_else(|| "missing request".to_string())?;
                let headers = request
                    .headers
                    .ok_or_else(|| "missing request.headers".to_string())?;
                let url = request
                    .url
                    .map(|raw| Url::parse(&raw).map_err(|e| format!("invalid request.url {}: {}", raw, e)))
                    .transpose()?;
                Ok(HttpOverride {
                    headers: Some(headers),
                    url,
                    replay_request,
                })
            }
            ExchangeKind::Response => Ok(HttpOverride {
                headers: None,
                url: None,
                replay_request,
            }),
            ExchangeKind::Conflict => Err("interceptor decision for a conflict exchange".to_string()),
        }
    }
}

/// Removes an id from the bridge's in-flight set on drop.
struct InFlight<'a> {
    map: &'a DashMap<CorrelationId, ExchangeKind>,
    id: CorrelationId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.id);
    }
}

/// Interception bridge for one replicator.
///
/// Created together with its replication task and destroyed with it.
pub struct InterceptionBridge {
    token: ReplicatorToken,
    exchanges: Arc<ExchangeRegistry>,
    sink: Arc<dyn EventSink>,
    decision_timeout: Duration,
    /// Exchanges this bridge is currently suspended on.
    in_flight: DashMap<CorrelationId, ExchangeKind>,
    /// Set by [`close`](Self::close); no new exchanges are suspended.
    closed: AtomicBool,
}

impl InterceptionBridge {
    pub fn new(
        token: ReplicatorToken,
        exchanges: Arc<ExchangeRegistry>,
        sink: Arc<dyn EventSink>,
        decision_timeout: Duration,
    ) -> Self {
        Self {
            token,
            exchanges,
            sink,
            decision_timeout,
            in_flight: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> ReplicatorToken {
        self.token
    }

    pub fn decision_timeout(&self) -> Duration {
        self.decision_timeout
    }

    /// Number of exchanges currently suspended on this bridge.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Intercept a request before it is sent.
    ///
    /// Applies the decision's headers (full replace), url and replay flag,
    /// or leaves the exchange untouched if no valid decision arrives in time.
    pub async fn intercept_request(&self, exchange: &mut HttpExchange) {
        let snapshot = Snapshot::Request {
            request: exchange.request_context(),
            replay_request: exchange.replay_request,
        };

        let Some((id, outcome)) = self.suspend(snapshot).await else {
            return;
        };
        match outcome {
            WaitOutcome::Decided(Decision::Http(decision)) => {
                if let Some(headers) = decision.headers {
                    exchange.request_headers = headers;
                }
                if let Some(url) = decision.url {
                    exchange.url = url;
                }
                exchange.replay_request = decision.replay_request;
                debug!(
                    token = %self.token,
                    correlation_id = %id,
                    replay = exchange.replay_request,
                    "Request decision applied"
                );
            }
            other => self.passthrough(ExchangeKind::Request, &id, &other),
        }
    }

    /// Intercept a response after it was received.
    ///
    /// Only the replay flag can be overridden.
    pub async fn intercept_response(&self, exchange: &mut HttpExchange) {
        let snapshot = Snapshot::Response {
            request: exchange.request_context(),
            response: exchange
                .response
                .as_ref()
                .map(ResponseContext::from)
                .unwrap_or_default(),
            replay_request: exchange.replay_request,
        };

        let Some((id, outcome)) = self.suspend(snapshot).await else {
            return;
        };
        match outcome {
            WaitOutcome::Decided(Decision::Http(decision)) => {
                exchange.replay_request = decision.replay_request;
                debug!(
                    token = %self.token,
                    correlation_id = %id,
                    replay = exchange.replay_request,
                    "Response decision applied"
                );
            }
            other => self.passthrough(ExchangeKind::Response, &id, &other),
        }
    }

    /// Register, publish and wait. The exchange is removed before returning.
    ///
    /// Returns `None` without suspending once the bridge is closed.
    async fn suspend(&self, snapshot: Snapshot) -> Option<(CorrelationId, WaitOutcome)> {
        let kind = snapshot.kind();
        if self.is_closed() {
            debug!(token = %self.token, kind = %kind, "Bridge closed, proceeding unmodified");
            return None;
        }

        let lease = self.exchanges.lease(snapshot.clone());
        let id = lease.id();

        self.in_flight.insert(id, kind);
        let in_flight = InFlight {
            map: &self.in_flight,
            id,
        };

        // close() may have swept in_flight before the insert above
        if self.is_closed() {
            debug!(token = %self.token, correlation_id = %id, kind = %kind, "Bridge closed, proceeding unmodified");
            return None;
        }

        // Publish only after the id is registered
        self.sink.publish(BridgeEvent::Intercept {
            token: self.token,
            correlation_id: id,
            snapshot,
        });

        let outcome = match lease.wait(Some(self.decision_timeout)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(token = %self.token, correlation_id = %id, error = %e, "Interceptor wait failed");
                WaitOutcome::Cancelled
            }
        };

        // Retire the id before it leaves in_flight, so a late post reads as a duplicate
        drop(lease);
        drop(in_flight);
        Some((id, outcome))
    }

    fn passthrough(&self, kind: ExchangeKind, id: &CorrelationId, outcome: &WaitOutcome) {
        match outcome {
            WaitOutcome::TimedOut => {
                let e = BridgeError::Timeout {
                    id: id.to_string(),
                    waited_ms: u64::try_from(self.decision_timeout.as_millis()).unwrap_or(u64::MAX),
                };
                warn!(
                    token = %self.token,
                    kind = %kind,
                    error = %e,
                    "Proceeding unmodified"
                );
                metrics::record_error(e.error_type());
            }
            WaitOutcome::Cancelled => {
                warn!(
                    token = %self.token,
                    correlation_id = %id,
                    kind = %kind,
                    "Interceptor wait interrupted, proceeding unmodified"
                );
            }
            WaitOutcome::Decided(_) => {
                debug!(token = %self.token, correlation_id = %id, kind = %kind, "No change requested");
            }
        }
    }

    /// Post the decision for one of this bridge's suspended exchanges.
    ///
    /// A missing decision resumes the exchange unmodified and logs the
    /// decision-maker's `elapsed_hint_ms` if one was supplied. A decision
    /// missing required fields is logged and treated as "no change".
    /// Unknown ids report `NotFound`; posts for an exchange that already
    /// accepted a decision or has ended report `DuplicateResolution`.
    pub fn post_decision(
        &self,
        id: &CorrelationId,
        decision: Option<InterceptorDecision>,
        elapsed_hint_ms: Option<u64>,
    ) -> Result<()> {
        let kind = self.in_flight_kind(id)?;

        let decision = match decision {
            None => {
                match elapsed_hint_ms {
                    Some(elapsed_ms) => warn!(
                        token = %self.token,
                        correlation_id = %id,
                        kind = %kind,
                        elapsed_ms,
                        "Interceptors timed out in the decision layer, proceeding unmodified"
                    ),
                    None => debug!(token = %self.token, correlation_id = %id, "Empty decision posted"),
                }
                Decision::NoChange
            }
            Some(decision) => match decision.validate(kind) {
                Ok(decision) => Decision::Http(decision),
                Err(reason) => return self.reject_malformed(id, kind, reason),
            },
        };

        self.exchanges.resolve(id, decision)
    }

    /// Post a decision as received from the host, before it is typed.
    ///
    /// `null` counts as a missing decision. A payload that does not
    /// deserialize is malformed: logged and treated as "no change".
    pub fn post_raw_decision(
        &self,
        id: &CorrelationId,
        decision: Option<Value>,
        elapsed_hint_ms: Option<u64>,
    ) -> Result<()> {
        let parsed = decision
            .filter(|value| !value.is_null())
            .map(serde_json::from_value::<InterceptorDecision>)
            .transpose();
        match parsed {
            Ok(decision) => self.post_decision(id, decision, elapsed_hint_ms),
            Err(e) => {
                let kind = self.in_flight_kind(id)?;
                self.reject_malformed(id, kind, e.to_string())
            }
        }
    }

    fn in_flight_kind(&self, id: &CorrelationId) -> Result<ExchangeKind> {
        if let Some(kind) = self.in_flight.get(id).map(|entry| *entry.value()) {
            return Ok(kind);
        }
        if self.exchanges.is_retired(id) {
            debug!(token = %self.token, correlation_id = %id, "Decision for an exchange that already ended");
            metrics::record_duplicate_decision();
            return Err(BridgeError::DuplicateResolution(id.to_string()));
        }
        Err(BridgeError::not_found("exchange", id))
    }

    fn reject_malformed(&self, id: &CorrelationId, kind: ExchangeKind, reason: String) -> Result<()> {
        let e = BridgeError::malformed(id, reason);
        warn!(
            token = %self.token,
            kind = %kind,
            error = %e,
            "Ignoring interceptor decision, proceeding unmodified"
        );
        metrics::record_malformed_decision(kind);
        metrics::record_error(e.error_type());
        self.exchanges.resolve(id, Decision::NoChange)
    }

    /// Close the bridge and resume every suspended exchange unmodified.
    ///
    /// Exchanges intercepted afterwards pass through without being
    /// suspended. Returns how many were released.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let ids: Vec<CorrelationId> = self.in_flight.iter().map(|e| *e.key()).collect();
        ids.iter()
            .filter(|id| self.exchanges.resolve(id, Decision::NoChange).is_ok())
            .count()
    }
}

impl HttpInterceptor for InterceptionBridge {
    fn intercept_request<'a>(&'a self, exchange: &'a mut HttpExchange) -> BoxFuture<'a, ()> {
        Box::pin(InterceptionBridge::intercept_request(self, exchange))
    }

    fn intercept_response<'a>(&'a self, exchange: &'a mut HttpExchange) -> BoxFuture<'a, ()> {
        Box::pin(InterceptionBridge::intercept_response(self, exchange))
    }
}
