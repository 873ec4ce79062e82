//! Per-request context and authenticated identity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use serde_json::Value;

use crate::error::DispatchError;
use crate::http::Request;

/// The authenticated identity attached to a request, if any.
///
/// Produced by an auth provider before guards run; read-only once attached.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// The authenticated user's identifier.
    pub user_id: String,
    /// The user's roles. Order is preserved; semantically a set.
    pub roles: Vec<String>,
    /// Optional fine-grained permissions.
    pub permissions: Option<Vec<String>>,
    /// Arbitrary provider-specific extension fields.
    pub extra: HashMap<String, Value>,
}

impl AuthContext {
    /// An auth context for the given user, with no roles.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Set the roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the user holds at least one of the required roles.
    pub fn has_any_role(&self, required: &[String]) -> bool {
        self.roles.iter().any(|role| required.contains(role))
    }
}

/// Request-scoped state threaded through guards, middleware, and bindings.
///
/// One per incoming request; never shared across requests. The body cache
/// guarantees the request body is parsed as JSON at most once per request,
/// no matter how many bindings ask for it.
#[derive(Debug)]
pub struct RequestContext {
    request: Arc<Request>,
    params: HashMap<String, String>,
    auth: Option<AuthContext>,
    body: OnceLock<Result<Value, String>>,
    extensions: Mutex<HashMap<String, Value>>,
}

impl RequestContext {
    /// Create a context for a matched request with its extracted path params.
    pub fn new(request: Arc<Request>, params: HashMap<String, String>) -> Self {
        Self {
            request,
            params,
            auth: None,
            body: OnceLock::new(),
            extensions: Mutex::new(HashMap::new()),
        }
    }

    /// The raw request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// All extracted path parameters.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// One extracted path parameter, by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The authenticated identity, if the auth provider produced one.
    pub fn auth(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    /// Attach the authenticated identity. Called once, before the context is
    /// shared with guards and middleware.
    pub fn set_auth(&mut self, auth: AuthContext) {
        self.auth = Some(auth);
    }

    /// The request body parsed as JSON.
    ///
    /// Parsing happens at most once per request; every subsequent call
    /// observes the cached result, including a cached parse failure.
    pub fn json_body(&self) -> Result<Value, DispatchError> {
        let cached = self.body.get_or_init(|| {
            serde_json::from_slice::<Value>(&self.request.body).map_err(|e| e.to_string())
        });
        match cached {
            Ok(value) => Ok(value.clone()),
            Err(detail) => Err(DispatchError::BodyParse(detail.clone())),
        }
    }

    /// Read an extension value set by earlier middleware.
    pub fn extension(&self, key: &str) -> Option<Value> {
        self.extensions
            .lock()
            .expect("context extensions poisoned")
            .get(key)
            .cloned()
    }

    /// Set an extension value for later middleware and handlers.
    pub fn set_extension(&self, key: impl Into<String>, value: Value) {
        self.extensions
            .lock()
            .expect("context extensions poisoned")
            .insert(key.into(), value);
    }
}
