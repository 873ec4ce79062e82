//! Declarative parameter bindings and typed argument extraction.
//!
//! A [`ParamBinding`] is a declarative instruction for extracting one handler
//! argument from the request or context. At dispatch time bindings are
//! resolved in `index` order into a positional [`CallArgs`] list; handlers
//! pull typed values back out through [`FromBound`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::collab::Schema;
use crate::context::RequestContext;
use crate::error::{BoxError, DispatchError};
use crate::http::{Json, Request};

/// Where a bound argument comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// The JSON-parsed request body (parsed at most once per request).
    Body,
    /// A query-string value, or the whole query map without a key.
    Query,
    /// A path parameter, or the whole params map without a key.
    RouteParam,
    /// The raw request object.
    RawRequest,
    /// A header value, or all headers without a key.
    Headers,
    /// The request context itself.
    FullContext,
}

/// A declarative instruction for extracting one handler argument.
#[derive(Clone)]
pub struct ParamBinding {
    /// Position of the argument in the handler's argument list.
    pub index: usize,
    /// Where the argument comes from.
    pub kind: BindingKind,
    /// Key within the source; `None` binds the whole collection.
    pub key: Option<String>,
    /// Optional validator applied to the resolved value.
    pub schema: Option<Arc<dyn Schema>>,
}

impl fmt::Debug for ParamBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamBinding")
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("schema", &self.schema.as_ref().map(|_| "<schema>"))
            .finish()
    }
}

impl ParamBinding {
    fn new(index: usize, kind: BindingKind, key: Option<String>) -> Self {
        Self {
            index,
            kind,
            key,
            schema: None,
        }
    }

    /// Bind the JSON-parsed request body.
    pub fn body(index: usize) -> Self {
        Self::new(index, BindingKind::Body, None)
    }

    /// Bind one query-string value.
    pub fn query(index: usize, key: impl Into<String>) -> Self {
        Self::new(index, BindingKind::Query, Some(key.into()))
    }

    /// Bind the whole query string as a key/value map.
    pub fn query_all(index: usize) -> Self {
        Self::new(index, BindingKind::Query, None)
    }

    /// Bind one path parameter.
    pub fn route_param(index: usize, key: impl Into<String>) -> Self {
        Self::new(index, BindingKind::RouteParam, Some(key.into()))
    }

    /// Bind the whole path-parameter map.
    pub fn route_params(index: usize) -> Self {
        Self::new(index, BindingKind::RouteParam, None)
    }

    /// Bind the raw request object.
    pub fn raw_request(index: usize) -> Self {
        Self::new(index, BindingKind::RawRequest, None)
    }

    /// Bind one header value.
    pub fn header(index: usize, key: impl Into<String>) -> Self {
        Self::new(index, BindingKind::Headers, Some(key.into()))
    }

    /// Bind all headers as a map.
    pub fn headers(index: usize) -> Self {
        Self::new(index, BindingKind::Headers, None)
    }

    /// Bind the request context itself.
    pub fn full_context(index: usize) -> Self {
        Self::new(index, BindingKind::FullContext, None)
    }

    /// Attach a validator.
    ///
    /// Applies to every binding that resolves to a value: the body, keyed
    /// lookups (validated as a JSON string, `null` when the key is absent),
    /// and whole-collection maps (validated as a JSON object). The
    /// validator's (possibly transformed) return value becomes the handler
    /// argument. Raw-request and context bindings resolve to shared handles
    /// and never pass through a validator.
    pub fn with_schema(mut self, schema: impl Schema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Resolve this binding against a request context.
    pub fn resolve(&self, ctx: &Arc<RequestContext>) -> Result<BoundValue, DispatchError> {
        let value = match self.kind {
            BindingKind::Body => BoundValue::Json(ctx.json_body()?),
            BindingKind::Query => match &self.key {
                Some(key) => BoundValue::Text(ctx.request().query_value(key)),
                None => BoundValue::Map(ctx.request().query_pairs()),
            },
            BindingKind::RouteParam => match &self.key {
                Some(key) => BoundValue::Text(ctx.param(key).map(str::to_owned)),
                None => BoundValue::Map(ctx.params().clone()),
            },
            BindingKind::RawRequest => BoundValue::Request(ctx.request().clone()),
            BindingKind::Headers => match &self.key {
                Some(key) => BoundValue::Text(ctx.request().header(key).map(str::to_owned)),
                None => BoundValue::Map(ctx.request().headers.clone()),
            },
            BindingKind::FullContext => BoundValue::Context(ctx.clone()),
        };
        match &self.schema {
            None => Ok(value),
            Some(schema) => value.validated(schema.as_ref()),
        }
    }
}

/// One resolved positional argument.
#[derive(Debug, Clone)]
pub enum BoundValue {
    /// A JSON value (body bindings).
    Json(Value),
    /// A single text value; `None` when the key was absent.
    Text(Option<String>),
    /// A whole string-to-string collection (query, params, headers).
    Map(HashMap<String, String>),
    /// The raw request.
    Request(Arc<Request>),
    /// The request context.
    Context(Arc<RequestContext>),
}

impl BoundValue {
    fn kind_name(&self) -> &'static str {
        match self {
            BoundValue::Json(_) => "json",
            BoundValue::Text(_) => "text",
            BoundValue::Map(_) => "map",
            BoundValue::Request(_) => "request",
            BoundValue::Context(_) => "context",
        }
    }

    /// Run a validator over the value-shaped variants. Text becomes a JSON
    /// string (`null` for an absent key) and maps become JSON objects before
    /// validation; shared handles pass through untouched.
    fn validated(self, schema: &dyn Schema) -> Result<BoundValue, DispatchError> {
        let raw = match self {
            BoundValue::Json(value) => value,
            BoundValue::Text(Some(text)) => Value::String(text),
            BoundValue::Text(None) => Value::Null,
            BoundValue::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ),
            handle @ (BoundValue::Request(_) | BoundValue::Context(_)) => return Ok(handle),
        };
        Ok(BoundValue::Json(schema.parse(raw)?))
    }
}

/// Extraction failure when a handler asks for a type the binding can't supply.
#[derive(Debug, Error)]
#[error("argument binding failed: {message}")]
pub struct BindError {
    message: String,
}

impl BindError {
    /// Create a new extraction error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The positional argument list a bound handler is invoked with.
pub struct CallArgs {
    values: Vec<Option<BoundValue>>,
}

impl CallArgs {
    /// Wrap resolved binding values, in `parameter_index` order.
    pub fn new(values: Vec<BoundValue>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    /// Wrap resolved values placed at their declared argument indices.
    ///
    /// `None` slots mark positions no binding was declared for, so sparse
    /// declarations (say indices 0 and 2) keep their positions instead of
    /// compacting.
    pub fn from_slots(slots: Vec<Option<BoundValue>>) -> Self {
        Self { values: slots }
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no bound arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take the argument at `index`, converting it to `T`.
    ///
    /// Each position can be taken once.
    pub fn take<T: FromBound>(&mut self, index: usize) -> Result<T, BoxError> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| BindError::new(format!("no argument bound at index {index}")))?;
        let value = slot.take().ok_or_else(|| {
            BindError::new(format!("argument {index} is unbound or already taken"))
        })?;
        T::from_bound(value)
    }
}

/// Conversion from a resolved [`BoundValue`] into a typed handler argument.
pub trait FromBound: Sized {
    /// Attempt the conversion.
    fn from_bound(value: BoundValue) -> Result<Self, BoxError>;
}

impl FromBound for BoundValue {
    fn from_bound(value: BoundValue) -> Result<Self, BoxError> {
        Ok(value)
    }
}

impl FromBound for String {
    fn from_bound(value: BoundValue) -> Result<Self, BoxError> {
        match value {
            BoundValue::Text(Some(text)) => Ok(text),
            BoundValue::Text(None) => Err(BindError::new("required value was absent").into()),
            BoundValue::Json(Value::String(text)) => Ok(text),
            other => Err(BindError::new(format!(
                "cannot bind String from a {} value",
                other.kind_name()
            ))
            .into()),
        }
    }
}

impl FromBound for Option<String> {
    fn from_bound(value: BoundValue) -> Result<Self, BoxError> {
        match value {
            BoundValue::Text(text) => Ok(text),
            BoundValue::Json(Value::String(text)) => Ok(Some(text)),
            BoundValue::Json(Value::Null) => Ok(None),
            other => Err(BindError::new(format!(
                "cannot bind Option<String> from a {} value",
                other.kind_name()
            ))
            .into()),
        }
    }
}

impl FromBound for HashMap<String, String> {
    fn from_bound(value: BoundValue) -> Result<Self, BoxError> {
        match value {
            BoundValue::Map(map) => Ok(map),
            other => Err(BindError::new(format!(
                "cannot bind a map from a {} value",
                other.kind_name()
            ))
            .into()),
        }
    }
}

impl FromBound for Value {
    fn from_bound(value: BoundValue) -> Result<Self, BoxError> {
        match value {
            BoundValue::Json(json) => Ok(json),
            BoundValue::Text(Some(text)) => Ok(Value::String(text)),
            BoundValue::Text(None) => Ok(Value::Null),
            other => Err(BindError::new(format!(
                "cannot bind a JSON value from a {} value",
                other.kind_name()
            ))
            .into()),
        }
    }
}

impl FromBound for Arc<Request> {
    fn from_bound(value: BoundValue) -> Result<Self, BoxError> {
        match value {
            BoundValue::Request(request) => Ok(request),
            other => Err(BindError::new(format!(
                "cannot bind the raw request from a {} value",
                other.kind_name()
            ))
            .into()),
        }
    }
}

impl FromBound for Arc<RequestContext> {
    fn from_bound(value: BoundValue) -> Result<Self, BoxError> {
        match value {
            BoundValue::Context(ctx) => Ok(ctx),
            other => Err(BindError::new(format!(
                "cannot bind the request context from a {} value",
                other.kind_name()
            ))
            .into()),
        }
    }
}

impl<T: DeserializeOwned> FromBound for Json<T> {
    fn from_bound(value: BoundValue) -> Result<Self, BoxError> {
        match value {
            BoundValue::Json(json) => Ok(Json(serde_json::from_value(json)?)),
            other => Err(BindError::new(format!(
                "cannot deserialize a typed body from a {} value",
                other.kind_name()
            ))
            .into()),
        }
    }
}
