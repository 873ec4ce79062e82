//! # rostra-core
//!
//! Core types and collaborator contracts for the Rostra routing and
//! request-dispatch layer.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! guards, middleware, and auth providers that don't need the full `rostra`
//! dispatcher.
//!
//! # What lives here
//!
//! - **Request model** ([`Request`], [`Response`], [`Outcome`]) — plain
//!   in-process values around `http` vocabulary types; the host transport is
//!   an external collaborator.
//! - **Request context** ([`RequestContext`], [`AuthContext`]) — per-request
//!   state threaded through guards, middleware, and bindings, with a
//!   parse-at-most-once body cache.
//! - **Parameter bindings** ([`ParamBinding`], [`CallArgs`], [`FromBound`]) —
//!   declarative extraction of handler arguments.
//! - **Collaborator contracts** ([`Guard`], [`Middleware`], [`AuthProvider`],
//!   [`Schema`], [`ExceptionFilter`]) — native `async fn` traits, each with
//!   an object-safe `Dyn*` companion and a blanket bridge impl.
//! - **Error taxonomy** ([`HttpError`], [`SchemaError`], [`DispatchError`],
//!   [`LoadError`]) plus the structural recognition predicates.

#![warn(missing_docs)]

mod binding;
mod collab;
mod context;
mod error;
mod http;

pub use binding::{BindError, BindingKind, BoundValue, CallArgs, FromBound, ParamBinding};
pub use collab::{
    AuthProvider, DynAuthProvider, DynGuard, DynMiddleware, Endpoint, ErrorCallback,
    ExceptionFilter, Guard, Middleware, Next, Schema,
};
pub use context::{AuthContext, RequestContext};
pub use error::{
    BoxError, DispatchError, HttpError, LoadError, SchemaError, SchemaIssue, body_parse_failure,
    schema_failure,
};
pub use http::{
    IntoOutcome, Json, Outcome, Request, RequestBuilder, Response, SUPPORTED_VERBS,
    is_supported_verb,
};
