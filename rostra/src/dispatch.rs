//! The request dispatch pipeline.
//!
//! [`Dispatcher::dispatch`] runs each request through a fixed sequence:
//! match, auth resolution, guards, role authorization, middleware,
//! parameter binding plus handler invocation, and response normalization.
//! Failures from any stage funnel into one resolution point; a miss in the
//! match stage is a routing outcome, not a failure, and never reaches the
//! exception filter.

use std::sync::Arc;

use http::{Method, StatusCode};
use rostra_core::{
    AuthProvider, BoundValue, CallArgs, DispatchError, DynAuthProvider, ErrorCallback,
    ExceptionFilter, HttpError, LoadError, Request, RequestContext, Response, SUPPORTED_VERBS,
};
use serde_json::json;

use crate::container::{Container, Injectable};
use crate::filter::DefaultExceptionFilter;
use crate::loader::{CompiledRoute, load};
use crate::matcher::match_route;
use crate::registry::{ControllerHandle, MetadataRegistry};

/// Everything the dispatcher is built from: the populated registry, the
/// controllers to mount, and the optional collaborators.
pub struct DispatcherConfig {
    registry: MetadataRegistry,
    container: Container,
    controllers: Vec<ControllerHandle>,
    prefix: String,
    auth_provider: Option<Arc<dyn DynAuthProvider>>,
    exception_filter: Option<Arc<dyn ExceptionFilter>>,
    on_error: Option<ErrorCallback>,
}

impl DispatcherConfig {
    /// Start a configuration over a populated registry.
    pub fn new(registry: MetadataRegistry) -> Self {
        Self {
            registry,
            container: Container::new(),
            controllers: Vec::new(),
            prefix: String::new(),
            auth_provider: None,
            exception_filter: None,
            on_error: None,
        }
    }

    /// Mount a controller. Routes compile in mount order before sorting.
    pub fn controller<C: Injectable>(mut self) -> Self {
        self.controllers.push(ControllerHandle::of::<C>());
        self
    }

    /// Use a pre-populated container instead of an empty one.
    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Prepend a global path prefix to every compiled route.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Resolve authenticated identities with this provider.
    pub fn auth_provider<A: AuthProvider>(mut self, provider: A) -> Self {
        self.auth_provider = Some(Arc::new(provider));
        self
    }

    /// Replace the default exception filter.
    pub fn exception_filter<F: ExceptionFilter>(mut self, filter: F) -> Self {
        self.exception_filter = Some(Arc::new(filter));
        self
    }

    /// Install the legacy single-callback error handler.
    ///
    /// When set, it wins unconditionally over any exception filter,
    /// including a custom one.
    #[deprecated(note = "use `exception_filter` instead")]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DispatchError, &Request) -> Response + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

/// The compiled dispatch pipeline. Cheap to share; all state is immutable
/// after construction, so concurrent requests need no further coordination.
pub struct Dispatcher {
    routes: Vec<CompiledRoute>,
    auth_provider: Option<Arc<dyn DynAuthProvider>>,
    exception_filter: Arc<dyn ExceptionFilter>,
    on_error: Option<ErrorCallback>,
}

impl Dispatcher {
    /// Compile the configured controllers into a ready pipeline.
    pub fn new(config: DispatcherConfig) -> Result<Self, LoadError> {
        let routes = load(
            &config.registry,
            &config.container,
            &config.controllers,
            &config.prefix,
        )?;
        tracing::info!(routes = routes.len(), "dispatcher ready");
        Ok(Self {
            routes,
            auth_provider: config.auth_provider,
            exception_filter: config
                .exception_filter
                .unwrap_or_else(|| Arc::new(DefaultExceptionFilter)),
            on_error: config.on_error,
        })
    }

    /// The compiled routes, in match-priority order.
    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Run one request through the pipeline.
    pub async fn dispatch(&self, request: Request) -> Response {
        let request = Arc::new(request);

        let Some(matched) = match_route(&self.routes, &request.method, &request.path) else {
            tracing::debug!(method = %request.method, path = %request.path, "no route matched");
            return not_found_response(&request);
        };
        let route = matched.route;
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            route = %route.full_path,
            "route matched"
        );

        let mut ctx = RequestContext::new(request.clone(), matched.params);
        if let Some(provider) = &self.auth_provider {
            match provider.authenticate_dyn(&request).await {
                Ok(Some(auth)) => ctx.set_auth(auth),
                Ok(None) => {}
                // A broken provider leaves the request unauthenticated;
                // only role checks downstream react to that.
                Err(error) => {
                    tracing::warn!(error = %error, path = %request.path, "auth provider failed");
                }
            }
        }
        let ctx = Arc::new(ctx);

        match run_route(route, &ctx).await {
            Ok(response) => response,
            Err(error) => self.resolve_error(&error, &request),
        }
    }

    fn resolve_error(&self, error: &DispatchError, request: &Request) -> Response {
        tracing::error!(
            error = %error,
            method = %request.method,
            path = %request.path,
            "request failed"
        );
        match &self.on_error {
            Some(callback) => callback(error, request),
            None => self.exception_filter.catch(error, request),
        }
    }
}

/// Guards, role authorization, middleware, binding, handler, normalization.
async fn run_route(
    route: &CompiledRoute,
    ctx: &Arc<RequestContext>,
) -> Result<Response, DispatchError> {
    for guard in &route.guards {
        match guard.can_activate_dyn(ctx).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(HttpError::forbidden("Access denied by guard").into());
            }
            Err(error) => return Err(DispatchError::from_boxed(error)),
        }
    }

    if let Some(required) = &route.route.roles {
        let Some(auth) = ctx.auth() else {
            return Err(HttpError::unauthorized("Authentication required").into());
        };
        if !required.is_empty() && !auth.has_any_role(required) {
            return Err(HttpError::forbidden("Insufficient role")
                .with_details(json!({ "required_roles": required }))
                .into());
        }
    }

    let handler = route.handler.clone();
    // Already ordered by argument index at load time.
    let bindings = route.route.bindings.clone();

    let endpoint: rostra_core::Endpoint = Box::new(move |ctx: Arc<RequestContext>| {
        Box::pin(async move {
            // Slot values at their declared indices so sparse declarations
            // (say 0 and 2) reach the handler at those positions.
            let len = bindings.last().map_or(0, |binding| binding.index + 1);
            let mut slots: Vec<Option<BoundValue>> = vec![None; len];
            for binding in &bindings {
                slots[binding.index] = Some(binding.resolve(&ctx)?);
            }
            let outcome = handler(CallArgs::from_slots(slots))
                .await
                .map_err(DispatchError::from_boxed)?;
            Ok(outcome.into_response())
        })
    });

    rostra_core::Next::new(&route.middleware, endpoint).run(ctx).await
}

fn not_found_response(request: &Request) -> Response {
    Response::json(
        StatusCode::NOT_FOUND,
        &json!({
            "error": "Route not found",
            "path": request.path,
            "method": request.method.as_str(),
        }),
    )
}

/// One callable per supported verb, each fixing the verb of the requests it
/// dispatches.
#[derive(Clone)]
pub struct VerbHandler {
    dispatcher: Arc<Dispatcher>,
    verb: Method,
}

impl VerbHandler {
    /// The verb this handler serves.
    pub fn verb(&self) -> &Method {
        &self.verb
    }

    /// Dispatch a raw request under this handler's verb.
    pub async fn call(&self, request: Request) -> Response {
        let mut request = request;
        request.method = self.verb.clone();
        self.dispatcher.dispatch(request).await
    }
}

/// The per-verb entry points produced from one configuration.
pub struct VerbHandlers {
    dispatcher: Arc<Dispatcher>,
}

impl VerbHandlers {
    /// Compile the configuration and expose one callable per supported verb.
    pub fn new(config: DispatcherConfig) -> Result<Self, LoadError> {
        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(config)?),
        })
    }

    /// The shared underlying dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The handler for one supported verb, `None` for anything else.
    pub fn handler(&self, verb: &Method) -> Option<VerbHandler> {
        SUPPORTED_VERBS.contains(verb).then(|| VerbHandler {
            dispatcher: self.dispatcher.clone(),
            verb: verb.clone(),
        })
    }

    /// The GET entry point.
    pub fn get(&self) -> VerbHandler {
        self.fixed(Method::GET)
    }

    /// The POST entry point.
    pub fn post(&self) -> VerbHandler {
        self.fixed(Method::POST)
    }

    /// The PUT entry point.
    pub fn put(&self) -> VerbHandler {
        self.fixed(Method::PUT)
    }

    /// The DELETE entry point.
    pub fn delete(&self) -> VerbHandler {
        self.fixed(Method::DELETE)
    }

    /// The PATCH entry point.
    pub fn patch(&self) -> VerbHandler {
        self.fixed(Method::PATCH)
    }

    fn fixed(&self, verb: Method) -> VerbHandler {
        VerbHandler {
            dispatcher: self.dispatcher.clone(),
            verb,
        }
    }
}
