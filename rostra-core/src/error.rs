//! Error types for Rostra.
//!
//! This module provides the structured failure taxonomy using `thiserror`:
//!
//! - [`HttpError`] - A failure that already carries an HTTP status
//! - [`SchemaError`] - A parameter validator rejected input
//! - [`DispatchError`] - Everything that can surface during request dispatch
//! - [`LoadError`] - Programmer errors detected while compiling routes

use http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure that carries an HTTP status, message, and optional details.
///
/// Guard and role checks raise this directly; the default exception filter
/// echoes its status, message, and details verbatim to the client.
#[derive(Error, Debug)]
#[error("{status} {message}")]
pub struct HttpError {
    /// The HTTP status to respond with.
    pub status: StatusCode,
    /// The client-visible message.
    pub message: String,
    /// Optional structured details included in the response body.
    pub details: Option<Value>,
}

impl HttpError {
    /// Create a new HTTP-carrying error.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details for the response body.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// A 401 Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// A 403 Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// A 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

/// One issue reported by a validator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SchemaIssue {
    /// Where in the input the issue occurred (empty string for the root).
    pub path: String,
    /// Human-readable description of the issue.
    pub message: String,
}

impl SchemaIssue {
    /// Create a new issue.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validator rejected input.
///
/// Mapped to 400 with a structured issue list by the default filter.
#[derive(Error, Debug)]
#[error("schema validation failed ({} issue(s))", issues.len())]
pub struct SchemaError {
    /// The individual issues the validator reported.
    pub issues: Vec<SchemaIssue>,
}

impl SchemaError {
    /// Create a schema error from a list of issues.
    pub fn new(issues: Vec<SchemaIssue>) -> Self {
        Self { issues }
    }

    /// Create a schema error with a single issue.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![SchemaIssue::new(path, message)],
        }
    }

    /// The issue list as a JSON value, for the 400 response details.
    pub fn to_details(&self) -> Value {
        json!(self.issues)
    }
}

/// Everything that can surface during request dispatch.
///
/// All variants funnel through a single error-resolution point; the raw
/// detail held by [`DispatchError::BodyParse`] and [`DispatchError::Handler`]
/// is for operator logs only and is never sent to clients.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A failure that already carries an HTTP status (guards, role checks,
    /// handlers raising [`HttpError`] deliberately).
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A parameter validator rejected input.
    #[error(transparent)]
    Validation(#[from] SchemaError),

    /// The request body was not valid JSON.
    #[error("invalid JSON body: {0}")]
    BodyParse(String),

    /// An unclassified failure from a guard, middleware, or handler.
    #[error("handler failed: {0}")]
    Handler(BoxError),
}

impl DispatchError {
    /// Classify a boxed error from a collaborator.
    ///
    /// Collaborators report failures as [`BoxError`]; a thrown [`HttpError`]
    /// or [`SchemaError`] keeps its classification, everything else is an
    /// unclassified handler failure.
    pub fn from_boxed(error: BoxError) -> Self {
        let error = match error.downcast::<HttpError>() {
            Ok(http) => return Self::Http(*http),
            Err(other) => other,
        };
        match error.downcast::<SchemaError>() {
            Ok(schema) => Self::Validation(*schema),
            Err(other) => Self::Handler(other),
        }
    }
}

/// Recognize a validation failure inside an unclassified error.
///
/// This is the structural check the default filter applies to errors raised
/// by handlers that wrap a validator failure instead of returning it.
pub fn schema_failure<'a>(
    error: &'a (dyn std::error::Error + 'static),
) -> Option<&'a SchemaError> {
    error.downcast_ref::<SchemaError>()
}

/// Recognize a body-parse failure inside an unclassified error.
///
/// Matches either a raw `serde_json` error or the message convention used by
/// [`DispatchError::BodyParse`].
pub fn body_parse_failure(error: &(dyn std::error::Error + 'static)) -> bool {
    error.downcast_ref::<serde_json::Error>().is_some()
        || error.to_string().starts_with("invalid JSON body")
}

/// Programmer errors detected while compiling routes.
///
/// These are raised by the loader at startup and are not recoverable at
/// request time.
#[derive(Error, Debug)]
pub enum LoadError {
    /// A route declares a handler name with no registered handler function.
    #[error("handler `{handler}` on controller `{controller}` is not registered")]
    UnknownHandler {
        /// The controller type name.
        controller: &'static str,
        /// The declared handler name.
        handler: String,
    },

    /// A route was declared without a verb + path.
    #[error("route `{handler}` on controller `{controller}` has no verb declaration")]
    MissingVerb {
        /// The controller type name.
        controller: &'static str,
        /// The declared handler name.
        handler: String,
    },

    /// A route was declared with a verb outside the supported set.
    #[error("route `{handler}` on controller `{controller}` uses unsupported verb {verb}")]
    UnsupportedVerb {
        /// The controller type name.
        controller: &'static str,
        /// The declared handler name.
        handler: String,
        /// The offending verb.
        verb: http::Method,
    },
}
