//! Process-wide route and controller metadata.
//!
//! The registry is an explicit, constructible component: it is populated
//! during application startup through the declaration builders
//! ([`controller`] and [`route`]), read once by the loader, and never
//! mutated during dispatch. Tests can instantiate isolated registries.
//!
//! Declaration sites may run in any relative order, so every record is
//! materialized lazily with get-or-create semantics and each declaration
//! only ever adds to or fills in fields, never overwrites what another
//! site already set.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::Method;
use rostra_core::{
    BoxError, CallArgs, DynGuard, DynMiddleware, Guard, IntoOutcome, Middleware, Outcome,
    ParamBinding,
};

use crate::container::{Container, Injectable};

/// A guard reference: either a ready instance or a type resolved through the
/// container at load time.
///
/// Class-referenced guards construct through the no-argument [`Injectable`]
/// path; a guard that needs constructor-supplied configuration must be
/// pre-built with [`GuardRef::instance`].
#[derive(Clone)]
pub enum GuardRef {
    /// A pre-built guard instance.
    Instance(Arc<dyn DynGuard>),
    /// A guard type, constructed through the container.
    Class(fn(&Container) -> Arc<dyn DynGuard>),
}

impl GuardRef {
    /// Wrap a ready guard instance.
    pub fn instance<G: Guard>(guard: G) -> Self {
        Self::Instance(Arc::new(guard))
    }

    /// Reference a guard type, resolved through the container at load time.
    pub fn class<G: Guard + Injectable>() -> Self {
        Self::Class(|container| container.resolve::<G>())
    }

    pub(crate) fn resolve(&self, container: &Container) -> Arc<dyn DynGuard> {
        match self {
            Self::Instance(guard) => guard.clone(),
            Self::Class(make) => make(container),
        }
    }
}

/// A middleware reference: either a ready instance or a type resolved
/// through the container at load time.
#[derive(Clone)]
pub enum MiddlewareRef {
    /// A pre-built middleware instance.
    Instance(Arc<dyn DynMiddleware>),
    /// A middleware type, constructed through the container.
    Class(fn(&Container) -> Arc<dyn DynMiddleware>),
}

impl MiddlewareRef {
    /// Wrap a ready middleware instance.
    pub fn instance<M: Middleware>(middleware: M) -> Self {
        Self::Instance(Arc::new(middleware))
    }

    /// Reference a middleware type, resolved through the container at load
    /// time.
    pub fn class<M: Middleware + Injectable>() -> Self {
        Self::Class(|container| container.resolve::<M>())
    }

    pub(crate) fn resolve(&self, container: &Container) -> Arc<dyn DynMiddleware> {
        match self {
            Self::Instance(middleware) => middleware.clone(),
            Self::Class(make) => make(container),
        }
    }
}

/// Controller-level metadata: base path, guards, middleware.
#[derive(Clone)]
pub struct ControllerMetadata {
    /// The controller type name, for diagnostics.
    pub name: &'static str,
    /// Base path prepended to every route path of this controller.
    pub base_path: String,
    /// Controller-level guards, in declaration order.
    pub guards: Vec<GuardRef>,
    /// Controller-level middleware, in declaration order.
    pub middleware: Vec<MiddlewareRef>,
}

impl ControllerMetadata {
    fn named(name: &'static str) -> Self {
        Self {
            name,
            base_path: String::new(),
            guards: Vec::new(),
            middleware: Vec::new(),
        }
    }
}

/// Per-route metadata: path, verb, roles, guards, middleware, bindings.
///
/// `roles` carries three meanings: `None` means authorization is not
/// required; `Some(vec![])` means any authenticated user; a non-empty list
/// means one of these roles is required.
#[derive(Clone)]
pub struct RouteMetadata {
    /// The route path template (empty until the verb declaration fills it).
    pub path: String,
    /// The route verb (`None` until the verb declaration fills it).
    pub verb: Option<Method>,
    /// The handler name this route dispatches to.
    pub handler_name: String,
    /// Required roles; presence alone mandates authentication.
    pub roles: Option<Vec<String>>,
    /// Route-level guards, evaluated after controller-level ones.
    pub guards: Vec<GuardRef>,
    /// Route-level middleware, run after controller-level ones.
    pub middleware: Vec<MiddlewareRef>,
    /// Parameter bindings, resolved in `index` order at dispatch.
    pub bindings: Vec<ParamBinding>,
}

impl RouteMetadata {
    fn placeholder(handler_name: &str) -> Self {
        Self {
            path: String::new(),
            verb: None,
            handler_name: handler_name.to_owned(),
            roles: None,
            guards: Vec::new(),
            middleware: Vec::new(),
            bindings: Vec::new(),
        }
    }
}

/// The future a bound handler resolves to.
pub type HandlerFuture = BoxFuture<'static, Result<Outcome, BoxError>>;

/// A handler function pre-bound to its controller instance.
pub type BoundHandler = Arc<dyn Fn(CallArgs) -> HandlerFuture + Send + Sync>;

/// Binds a type-erased controller singleton into a [`BoundHandler`].
///
/// Returns `None` if the erased instance is not the controller type the
/// handler was registered for (which the loader treats as an unknown
/// handler).
type HandlerFactory = Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> Option<BoundHandler> + Send + Sync>;

/// The process-wide store of controller and route metadata.
#[derive(Default)]
pub struct MetadataRegistry {
    controllers: HashMap<TypeId, ControllerMetadata>,
    // Declaration order matters: compiled-route order must be deterministic,
    // so routes live in a Vec rather than a map.
    routes: Vec<(TypeId, RouteMetadata)>,
    handlers: HashMap<(TypeId, String), HandlerFactory>,
}

impl MetadataRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the metadata record for a controller type.
    ///
    /// Never overwrites fields an earlier declaration already set.
    pub fn ensure_controller<C: 'static>(&mut self) -> &mut ControllerMetadata {
        self.controllers
            .entry(TypeId::of::<C>())
            .or_insert_with(|| ControllerMetadata::named(type_name::<C>()))
    }

    /// Get-or-create the metadata record for a (controller, handler) pair.
    pub fn ensure_route<C: 'static>(&mut self, handler_name: &str) -> &mut RouteMetadata {
        let type_id = TypeId::of::<C>();
        let position = self
            .routes
            .iter()
            .position(|(id, meta)| *id == type_id && meta.handler_name == handler_name);
        let index = match position {
            Some(index) => index,
            None => {
                self.routes
                    .push((type_id, RouteMetadata::placeholder(handler_name)));
                self.routes.len() - 1
            }
        };
        &mut self.routes[index].1
    }

    /// The controller metadata for a type, if any declaration touched it.
    pub fn controller_metadata(&self, type_id: TypeId) -> Option<&ControllerMetadata> {
        self.controllers.get(&type_id)
    }

    /// All route metadata for a controller type, in declaration order.
    pub fn routes_for(&self, type_id: TypeId) -> impl Iterator<Item = &RouteMetadata> {
        self.routes
            .iter()
            .filter(move |(id, _)| *id == type_id)
            .map(|(_, meta)| meta)
    }

    pub(crate) fn handler_factory(
        &self,
        type_id: TypeId,
        handler_name: &str,
    ) -> Option<&HandlerFactory> {
        self.handlers.get(&(type_id, handler_name.to_owned()))
    }

    /// Register the handler function for a (controller, handler name) pair.
    ///
    /// The closure receives the controller singleton and the resolved
    /// positional arguments; its return value goes through outcome
    /// normalization.
    pub fn register_handler<C, F, Fut, R>(&mut self, handler_name: &str, handler: F)
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, CallArgs) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        let factory: HandlerFactory = Arc::new(move |instance: Arc<dyn Any + Send + Sync>| {
            let instance = instance.downcast::<C>().ok()?;
            let handler = handler.clone();
            let bound: BoundHandler = Arc::new(move |args| {
                let future = handler(instance.clone(), args);
                Box::pin(async move { future.await.into_outcome() })
            });
            Some(bound)
        });
        self.handlers
            .insert((TypeId::of::<C>(), handler_name.to_owned()), factory);
    }
}

/// Start (or continue) a controller-level declaration.
pub fn controller<C: 'static>(registry: &mut MetadataRegistry) -> ControllerDecl<'_, C> {
    registry.ensure_controller::<C>();
    ControllerDecl {
        registry,
        _marker: PhantomData,
    }
}

/// Start (or continue) a route-level declaration for a handler name.
pub fn route<'r, C: 'static>(
    registry: &'r mut MetadataRegistry,
    handler_name: &str,
) -> RouteDecl<'r, C> {
    registry.ensure_route::<C>(handler_name);
    RouteDecl {
        registry,
        handler_name: handler_name.to_owned(),
        _marker: PhantomData,
    }
}

/// Fluent controller-level declaration; every call adds or fills in.
pub struct ControllerDecl<'r, C> {
    registry: &'r mut MetadataRegistry,
    _marker: PhantomData<C>,
}

impl<'r, C: 'static> ControllerDecl<'r, C> {
    /// Declare the base path shared by all routes of this controller.
    pub fn base_path(self, path: impl Into<String>) -> Self {
        self.registry.ensure_controller::<C>().base_path = path.into();
        self
    }

    /// Append a controller-level guard.
    pub fn guard(self, guard: GuardRef) -> Self {
        self.registry.ensure_controller::<C>().guards.push(guard);
        self
    }

    /// Append controller-level middleware.
    pub fn middleware(self, middleware: MiddlewareRef) -> Self {
        self.registry
            .ensure_controller::<C>()
            .middleware
            .push(middleware);
        self
    }
}

/// Fluent route-level declaration; every call adds or fills in.
pub struct RouteDecl<'r, C> {
    registry: &'r mut MetadataRegistry,
    handler_name: String,
    _marker: PhantomData<C>,
}

impl<'r, C: Send + Sync + 'static> RouteDecl<'r, C> {
    fn meta(&mut self) -> &mut RouteMetadata {
        self.registry.ensure_route::<C>(&self.handler_name)
    }

    /// Declare the verb and path template for this route.
    pub fn verb(mut self, verb: Method, path: impl Into<String>) -> Self {
        let meta = self.meta();
        meta.verb = Some(verb);
        meta.path = path.into();
        self
    }

    /// Declare a GET route.
    pub fn get(self, path: impl Into<String>) -> Self {
        self.verb(Method::GET, path)
    }

    /// Declare a POST route.
    pub fn post(self, path: impl Into<String>) -> Self {
        self.verb(Method::POST, path)
    }

    /// Declare a PUT route.
    pub fn put(self, path: impl Into<String>) -> Self {
        self.verb(Method::PUT, path)
    }

    /// Declare a DELETE route.
    pub fn delete(self, path: impl Into<String>) -> Self {
        self.verb(Method::DELETE, path)
    }

    /// Declare a PATCH route.
    pub fn patch(self, path: impl Into<String>) -> Self {
        self.verb(Method::PATCH, path)
    }

    /// Require one of the given roles (and therefore authentication).
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = self.meta().roles.get_or_insert_with(Vec::new);
        slot.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Require authentication without requiring any particular role.
    pub fn authenticated(mut self) -> Self {
        self.meta().roles.get_or_insert_with(Vec::new);
        self
    }

    /// Append a route-level guard.
    pub fn guard(mut self, guard: GuardRef) -> Self {
        self.meta().guards.push(guard);
        self
    }

    /// Append route-level middleware.
    pub fn middleware(mut self, middleware: MiddlewareRef) -> Self {
        self.meta().middleware.push(middleware);
        self
    }

    /// Append a parameter binding.
    pub fn bind(mut self, binding: ParamBinding) -> Self {
        self.meta().bindings.push(binding);
        self
    }

    /// Register the handler function for this route.
    pub fn handler<F, Fut, R>(self, handler: F) -> Self
    where
        F: Fn(Arc<C>, CallArgs) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        self.registry
            .register_handler::<C, _, _, _>(&self.handler_name, handler);
        self
    }
}

/// A reference to a controller type the dispatcher should load.
#[derive(Clone)]
pub struct ControllerHandle {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    construct: fn(&Container) -> Arc<dyn Any + Send + Sync>,
}

impl ControllerHandle {
    /// Reference a controller type; its singleton is resolved through the
    /// container at load time.
    pub fn of<C: Injectable>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: type_name::<C>(),
            construct: |container| container.resolve::<C>(),
        }
    }

    pub(crate) fn instantiate(&self, container: &Container) -> Arc<dyn Any + Send + Sync> {
        (self.construct)(container)
    }
}
