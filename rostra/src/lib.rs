//! # rostra - Declarative HTTP Routing and Request Dispatch
//!
//! `rostra` turns declarative controller and route metadata into a compiled,
//! specificity-sorted dispatch pipeline. Declarations populate a
//! [`MetadataRegistry`] in any order; the loader compiles them once at
//! startup; [`Dispatcher::dispatch`] runs each request through matching,
//! auth resolution, guards, role authorization, middleware, parameter
//! binding, and response normalization.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rostra::prelude::*;
//!
//! struct Users;
//!
//! impl Injectable for Users {
//!     fn construct(_container: &Container) -> Self { Users }
//! }
//!
//! let mut registry = MetadataRegistry::new();
//! controller::<Users>(&mut registry).base_path("/users");
//! route::<Users>(&mut registry, "show")
//!     .get("/:id")
//!     .bind(ParamBinding::route_param(0, "id"))
//!     .handler(|_users, mut args| async move {
//!         let id: String = args.take(0)?;
//!         Ok(serde_json::json!({ "id": id }))
//!     });
//!
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::new(registry).controller::<Users>(),
//! )?;
//! let response = dispatcher.dispatch(request).await;
//! ```

#![warn(missing_docs)]

pub mod container;
pub mod dispatch;
pub mod filter;
pub mod loader;
pub mod matcher;
pub mod path;
pub mod registry;
pub mod testing;

pub use container::{Container, Injectable};
pub use dispatch::{Dispatcher, DispatcherConfig, VerbHandler, VerbHandlers};
pub use filter::DefaultExceptionFilter;
pub use loader::{CompiledRoute, compare_specificity, load};
pub use matcher::{RouteMatch, match_route};
pub use path::{PathPattern, Segment, normalize};
pub use registry::{
    BoundHandler, ControllerDecl, ControllerHandle, ControllerMetadata, GuardRef,
    MetadataRegistry, MiddlewareRef, RouteDecl, RouteMetadata, controller, route,
};

pub use rostra_core::{
    AuthContext, AuthProvider, BindError, BindingKind, BoundValue, BoxError, CallArgs,
    DispatchError, DynAuthProvider, DynGuard, DynMiddleware, Endpoint, ErrorCallback,
    ExceptionFilter,
    FromBound, Guard, HttpError, IntoOutcome, Json, LoadError, Middleware, Next, Outcome,
    ParamBinding, Request, RequestBuilder, RequestContext, Response, SUPPORTED_VERBS, Schema,
    SchemaError, SchemaIssue, body_parse_failure, is_supported_verb, schema_failure,
};

/// Common imports for building controllers and collaborators.
///
/// ```rust,ignore
/// use rostra::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AuthContext, AuthProvider, BoxError, CallArgs, Container, DispatchError, Dispatcher,
        DispatcherConfig, ExceptionFilter, Guard, GuardRef, HttpError, Injectable, Json,
        MetadataRegistry, Middleware, MiddlewareRef, Next, Outcome, ParamBinding, Request,
        RequestContext, Response, Schema, SchemaError, controller, route,
    };
}
