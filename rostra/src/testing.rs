//! Test doubles for pipeline collaborators.
//!
//! Deterministic, inspectable implementations of the collaborator traits,
//! for exercising guard ordering, middleware short-circuits, role checks,
//! and validation paths without real infrastructure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rostra_core::{
    AuthContext, AuthProvider, BoxError, DispatchError, Guard, Middleware, Next, RequestContext,
    Request, Response, Schema, SchemaError,
};
use serde_json::Value;

/// A guard with a fixed verdict that counts how often it was consulted.
pub struct RecordingGuard {
    verdict: bool,
    calls: AtomicUsize,
}

impl RecordingGuard {
    /// A guard that always allows.
    pub fn allowing() -> Self {
        Self {
            verdict: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// A guard that always denies.
    pub fn denying() -> Self {
        Self {
            verdict: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times the guard was consulted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Guard for RecordingGuard {
    async fn can_activate(&self, _ctx: &RequestContext) -> Result<bool, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict)
    }
}

/// A shared log of which middleware ran, in order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Create an empty call log.
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A middleware that appends its label to a shared log around the rest of
/// the chain, optionally short-circuiting with a fixed response.
pub struct RecordingMiddleware {
    label: String,
    log: CallLog,
    short_circuit: Option<Response>,
}

impl RecordingMiddleware {
    /// A pass-through middleware that logs `label` before continuing.
    pub fn passing(label: impl Into<String>, log: CallLog) -> Self {
        Self {
            label: label.into(),
            log,
            short_circuit: None,
        }
    }

    /// A middleware that logs `label` and returns `response` without ever
    /// calling the rest of the chain.
    pub fn blocking(label: impl Into<String>, log: CallLog, response: Response) -> Self {
        Self {
            label: label.into(),
            log,
            short_circuit: Some(response),
        }
    }

    fn record(&self) {
        self.log
            .lock()
            .expect("call log poisoned")
            .push(self.label.clone());
    }
}

impl Middleware for RecordingMiddleware {
    async fn run(
        &self,
        ctx: &Arc<RequestContext>,
        next: Next<'_>,
    ) -> Result<Response, DispatchError> {
        self.record();
        match &self.short_circuit {
            Some(response) => Ok(response.clone()),
            None => next.run(ctx).await,
        }
    }
}

/// An auth provider that resolves every request to the same identity.
pub struct StaticAuthProvider {
    auth: Option<AuthContext>,
}

impl StaticAuthProvider {
    /// Authenticate every request as this identity.
    pub fn new(auth: AuthContext) -> Self {
        Self { auth: Some(auth) }
    }

    /// Leave every request unauthenticated.
    pub fn anonymous() -> Self {
        Self { auth: None }
    }
}

impl AuthProvider for StaticAuthProvider {
    async fn authenticate(&self, _request: &Request) -> Result<Option<AuthContext>, BoxError> {
        Ok(self.auth.clone())
    }
}

/// An auth provider that always fails at the provider level.
///
/// Provider failures must leave the request unauthenticated instead of
/// aborting it; pair with a roles-free route to observe a 200.
pub struct FailingAuthProvider;

impl AuthProvider for FailingAuthProvider {
    async fn authenticate(&self, _request: &Request) -> Result<Option<AuthContext>, BoxError> {
        Err("token service unreachable".into())
    }
}

/// A validator with a fixed outcome.
pub enum StubSchema {
    /// Accept the input unchanged.
    Accepting,
    /// Reject every input with this issue message at the root path.
    Rejecting(String),
}

impl Schema for StubSchema {
    fn parse(&self, value: Value) -> Result<Value, SchemaError> {
        match self {
            Self::Accepting => Ok(value),
            Self::Rejecting(message) => Err(SchemaError::single("", message.clone())),
        }
    }
}
