//! Request/response model and handler-outcome normalization.
//!
//! The host transport is an external collaborator; this layer dispatches
//! already-received requests, so [`Request`] and [`Response`] are plain
//! in-process values built around `http` vocabulary types.

use std::collections::HashMap;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::BoxError;

/// The verbs this layer dispatches.
pub const SUPPORTED_VERBS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
];

/// Whether a method is one of the supported verbs.
pub fn is_supported_verb(method: &Method) -> bool {
    SUPPORTED_VERBS.contains(method)
}

/// An already-received HTTP request, handed to the dispatcher by the host.
#[derive(Debug, Clone)]
pub struct Request {
    /// The request method.
    pub method: Method,
    /// The request path, without query string.
    pub path: String,
    /// The raw query string, without the leading `?`.
    pub query: String,
    /// Request headers. Keys are lowercase.
    pub headers: HashMap<String, String>,
    /// The raw request body.
    pub body: Bytes,
}

impl Request {
    /// Start building a request.
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            request: Request {
                method,
                path: path.into(),
                query: String::new(),
                headers: HashMap::new(),
                body: Bytes::new(),
            },
        }
    }

    /// A single header value, by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The query string parsed into a key/value map. Repeated keys: last wins.
    pub fn query_pairs(&self) -> HashMap<String, String> {
        let mut pairs = HashMap::new();
        for chunk in self.query.split('&').filter(|c| !c.is_empty()) {
            match chunk.split_once('=') {
                Some((key, value)) => pairs.insert(key.to_owned(), value.to_owned()),
                None => pairs.insert(chunk.to_owned(), String::new()),
            };
        }
        pairs
    }

    /// A single query-string value, if present.
    pub fn query_value(&self, key: &str) -> Option<String> {
        self.query_pairs().remove(key)
    }
}

/// Builder for [`Request`], mainly for tests and embedding hosts.
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Set the raw query string (no leading `?`).
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.request.query = query.into();
        self
    }

    /// Add a header. The name is lowercased.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.request
            .headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Set a JSON body and the matching content-type header.
    pub fn json(self, value: &Value) -> Self {
        self.header("content-type", "application/json")
            .body(value.to_string())
    }

    /// Finish building.
    pub fn build(self) -> Request {
        self.request
    }
}

/// The response handed back to the host.
#[derive(Debug, Clone)]
pub struct Response {
    /// The response status.
    pub status: StatusCode,
    /// Response headers. Keys are lowercase.
    pub headers: HashMap<String, String>,
    /// The response body.
    pub body: Bytes,
}

impl Response {
    /// An empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// A JSON response with the given status and body.
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut response = Self::new(status);
        response
            .headers
            .insert("content-type".to_owned(), "application/json".to_owned());
        response.body = Bytes::from(body.to_string());
        response
    }

    /// Add a header. The name is lowercased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Parse the body as JSON, if it is JSON. Test convenience.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// What a handler produced, before response normalization.
#[derive(Debug)]
pub enum Outcome {
    /// A plain value; serialized as a JSON response with default success status.
    Json(Value),
    /// A full response; passed through unchanged, including its status.
    Full(Response),
}

impl Outcome {
    /// Normalize into the final response.
    pub fn into_response(self) -> Response {
        match self {
            Outcome::Json(value) => Response::json(StatusCode::OK, &value),
            Outcome::Full(response) => response,
        }
    }
}

/// Conversion of handler return values into an [`Outcome`].
pub trait IntoOutcome {
    /// Convert into an outcome, or fail with an error that will go through
    /// the exception-resolution path.
    fn into_outcome(self) -> Result<Outcome, BoxError>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        Ok(self)
    }
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        Ok(Outcome::Full(self))
    }
}

impl IntoOutcome for Value {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        Ok(Outcome::Json(self))
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        Ok(Outcome::Json(Value::Null))
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        match self {
            Ok(value) => value.into_outcome(),
            Err(error) => Err(error.into()),
        }
    }
}

/// Serialize any `Serialize` value as the JSON outcome.
///
/// Doubles as the typed-body extractor in [`crate::binding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoOutcome for Json<T> {
    fn into_outcome(self) -> Result<Outcome, BoxError> {
        Ok(Outcome::Json(serde_json::to_value(self.0)?))
    }
}
