//! Collaborator contracts: guards, middleware, auth providers, validators,
//! and exception filters.
//!
//! Each async contract comes in two forms: a native `async fn` trait for
//! implementors, and an object-safe `Dyn*` companion used wherever trait
//! objects are stored. A blanket impl bridges the two, so implementing the
//! native trait is always enough.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::{AuthContext, RequestContext};
use crate::error::{BoxError, DispatchError, SchemaError};
use crate::http::{Request, Response};

/// A boolean-returning access check evaluated before a handler runs.
///
/// Returning `false` rejects the request with 403 "Access denied by guard"
/// and stops evaluation of subsequent guards.
///
/// # Example
///
/// ```rust
/// use rostra_core::{BoxError, Guard, RequestContext};
///
/// struct HeaderGuard;
///
/// impl Guard for HeaderGuard {
///     async fn can_activate(&self, ctx: &RequestContext) -> Result<bool, BoxError> {
///         Ok(ctx.request().header("x-api-key").is_some())
///     }
/// }
/// ```
pub trait Guard: Send + Sync + 'static {
    /// Decide whether the request may proceed.
    fn can_activate(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<bool, BoxError>> + Send;
}

impl<G: Guard> Guard for Arc<G> {
    fn can_activate(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<bool, BoxError>> + Send {
        (**self).can_activate(ctx)
    }
}

/// Object-safe version of [`Guard`] for storage in route metadata.
pub trait DynGuard: Send + Sync + 'static {
    /// Object-safe [`Guard::can_activate`].
    fn can_activate_dyn<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<bool, BoxError>>;
}

impl<G: Guard> DynGuard for G {
    fn can_activate_dyn<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> BoxFuture<'a, Result<bool, BoxError>> {
        Box::pin(self.can_activate(ctx))
    }
}

/// The continuation handed to each middleware.
///
/// Calling [`Next::run`] invokes the rest of the chain (and ultimately the
/// handler) and resolves to the eventual response. A middleware that never
/// calls it short-circuits the chain; its own returned response is final.
pub struct Next<'a> {
    chain: &'a [Arc<dyn DynMiddleware>],
    endpoint: Endpoint,
}

/// The terminal step of a middleware chain: parameter binding plus handler
/// invocation, packaged as a one-shot closure.
pub type Endpoint =
    Box<dyn FnOnce(Arc<RequestContext>) -> BoxFuture<'static, Result<Response, DispatchError>> + Send>;

impl<'a> Next<'a> {
    /// Build a continuation over the remaining chain and terminal endpoint.
    pub fn new(chain: &'a [Arc<dyn DynMiddleware>], endpoint: Endpoint) -> Self {
        Self { chain, endpoint }
    }

    /// Invoke the next middleware, or the endpoint at the end of the chain.
    pub async fn run(self, ctx: &Arc<RequestContext>) -> Result<Response, DispatchError> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                head.run_dyn(ctx, Next::new(rest, self.endpoint)).await
            }
            None => (self.endpoint)(ctx.clone()).await,
        }
    }
}

/// A chain-of-responsibility wrapper around handler execution.
///
/// Controller-level middleware runs before route-level middleware, in
/// declaration order. A middleware may inspect or transform the response
/// after calling `next.run(...)`, or skip the rest of the chain entirely by
/// returning its own response.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rostra_core::{DispatchError, Middleware, Next, RequestContext, Response};
///
/// struct ServerHeader;
///
/// impl Middleware for ServerHeader {
///     async fn run(
///         &self,
///         ctx: &Arc<RequestContext>,
///         next: Next<'_>,
///     ) -> Result<Response, DispatchError> {
///         let response = next.run(ctx).await?;
///         Ok(response.with_header("server", "rostra"))
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    /// Run around the rest of the chain.
    fn run(
        &self,
        ctx: &Arc<RequestContext>,
        next: Next<'_>,
    ) -> impl Future<Output = Result<Response, DispatchError>> + Send;
}

/// Object-safe version of [`Middleware`] for storage in route metadata.
pub trait DynMiddleware: Send + Sync + 'static {
    /// Object-safe [`Middleware::run`].
    fn run_dyn<'a>(
        &'a self,
        ctx: &'a Arc<RequestContext>,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, DispatchError>>;
}

impl<M: Middleware> DynMiddleware for M {
    fn run_dyn<'a>(
        &'a self,
        ctx: &'a Arc<RequestContext>,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, DispatchError>> {
        Box::pin(self.run(ctx, next))
    }
}

/// Resolves the authenticated identity for a raw request.
///
/// `Ok(None)` and `Err(_)` both mean "unauthenticated": provider failures are
/// logged and never abort the request. Only authorization checks downstream
/// react to the absence of an [`AuthContext`].
pub trait AuthProvider: Send + Sync + 'static {
    /// Resolve the identity carried by the request, if any.
    fn authenticate(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Option<AuthContext>, BoxError>> + Send;
}

/// Object-safe version of [`AuthProvider`].
pub trait DynAuthProvider: Send + Sync + 'static {
    /// Object-safe [`AuthProvider::authenticate`].
    fn authenticate_dyn<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Option<AuthContext>, BoxError>>;
}

impl<A: AuthProvider> DynAuthProvider for A {
    fn authenticate_dyn<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Option<AuthContext>, BoxError>> {
        Box::pin(self.authenticate(request))
    }
}

/// A validator attached to a parameter binding.
///
/// `parse` may transform the value; the binding uses its return value as the
/// handler argument. A rejection propagates as a [`SchemaError`], mapped to
/// 400 with the issue list.
pub trait Schema: Send + Sync + 'static {
    /// Validate and possibly transform a parsed value.
    fn parse(&self, value: Value) -> Result<Value, SchemaError>;
}

/// Converts a dispatch failure into the client-visible response.
///
/// A configured filter overrides the built-in taxonomy mapping; the raw
/// error is logged by the pipeline before any filter runs.
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Produce the response for a failed request.
    fn catch(&self, error: &DispatchError, request: &Request) -> Response;
}

/// The deprecated single-callback error handler.
///
/// Kept for backward compatibility; when configured it wins unconditionally
/// over any exception filter.
pub type ErrorCallback = Arc<dyn Fn(&DispatchError, &Request) -> Response + Send + Sync>;
