//! Scripted replication engine for testing.
//!
//! Tasks record start/stop calls and expose the interceptor and listener the
//! bridge installed, so tests can drive HTTP exchanges and lifecycle events
//! the way a real engine would.

use replication_bridge::engine::{
    BuildRequest, EngineError, EngineResult, HttpInterceptor, ReplicationTask, ReplicatorFactory,
};
use replication_bridge::events::ReplicationListener;
use replication_bridge::interceptor::{Headers, HttpExchange};
use replication_bridge::replicator::{ReplicationState, ReplicatorSpec, ReplicatorToken};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

/// A replication task whose state is set by the test.
pub struct ScriptedTask {
    spec: ReplicatorSpec,
    state: Mutex<ReplicationState>,
    interceptor: Arc<dyn HttpInterceptor>,
    listener: ReplicationListener,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedTask {
    pub fn spec(&self) -> &ReplicatorSpec {
        &self.spec
    }

    pub fn start_calls(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn set_state(&self, state: ReplicationState) {
        *self.state.lock().unwrap() = state;
    }

    /// Outbound request to `path` on the remote, run through the interceptor.
    pub async fn send_request(&self, path: &str, headers: &[(&str, &str)]) -> HttpExchange {
        let mut exchange = HttpExchange::new(self.remote(path));
        for (name, value) in headers {
            exchange.request_headers.insert(name.to_string(), value.to_string());
        }
        self.interceptor.intercept_request(&mut exchange).await;
        exchange
    }

    /// Response to a request on `path`, run through the interceptor.
    pub async fn receive_response(&self, path: &str, status_code: u16) -> HttpExchange {
        let mut exchange = HttpExchange::new(self.remote(path)).with_response(status_code, Headers::new());
        self.interceptor.intercept_response(&mut exchange).await;
        exchange
    }

    /// Finish replicating and notify the listener.
    pub fn complete(&self, documents_replicated: u64) {
        self.set_state(ReplicationState::Complete);
        self.listener.completed(documents_replicated);
    }

    /// Fail and notify the listener.
    pub fn fail(&self, message: &str) {
        self.set_state(ReplicationState::Error);
        self.listener.errored(message);
    }

    fn remote(&self, path: &str) -> Url {
        self.spec
            .remote_url
            .join(path)
            .unwrap_or_else(|_| self.spec.remote_url.clone())
    }
}

impl ReplicationTask for ScriptedTask {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.set_state(ReplicationState::Started);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.set_state(ReplicationState::Stopping);
    }

    fn state(&self) -> ReplicationState {
        *self.state.lock().unwrap()
    }
}

/// Factory that records every task it builds.
///
/// # Example
/// ```rust,ignore
/// let factory = ScriptedFactory::new();
/// factory.reject_host("broken.example");
///
/// // ... create replicators through the coordinator ...
///
/// let task = factory.task(ReplicatorToken::new(42)).unwrap();
/// let exchange = task.send_request("_changes", &[]).await;
/// ```
#[derive(Default)]
pub struct ScriptedFactory {
    tasks: Mutex<HashMap<ReplicatorToken, Arc<ScriptedTask>>>,
    rejected_hosts: Mutex<Vec<String>>,
    builds: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to build tasks whose remote is on `host`.
    pub fn reject_host(&self, host: &str) {
        self.rejected_hosts.lock().unwrap().push(host.to_string());
    }

    /// Most recent task built for `token`.
    pub fn task(&self, token: ReplicatorToken) -> Option<Arc<ScriptedTask>> {
        self.tasks.lock().unwrap().get(&token).cloned()
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ReplicatorFactory for ScriptedFactory {
    fn build(&self, request: BuildRequest) -> EngineResult<Arc<dyn ReplicationTask>> {
        let host = request.spec.remote_url.host_str().unwrap_or_default().to_string();
        if self.rejected_hosts.lock().unwrap().contains(&host) {
            return Err(EngineError::new(format!("builder returned nothing for {}", host)));
        }

        self.builds.fetch_add(1, Ordering::SeqCst);
        let token = request.listener.token();
        let task = Arc::new(ScriptedTask {
            spec: request.spec,
            state: Mutex::new(ReplicationState::Pending),
            interceptor: request.interceptor,
            listener: request.listener,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        });
        self.tasks.lock().unwrap().insert(token, Arc::clone(&task));
        Ok(task)
    }
}
