//! The dispatch pipeline stage by stage: auth, guards, roles, middleware,
//! and response normalization.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::{Method, StatusCode};
use rostra::testing::{
    FailingAuthProvider, RecordingGuard, RecordingMiddleware, StaticAuthProvider, call_log,
};
use rostra::{
    AuthContext, CallArgs, Container, DispatchError, Dispatcher, DispatcherConfig, Guard,
    GuardRef, Injectable, MetadataRegistry, Middleware, MiddlewareRef, Next, Outcome,
    ParamBinding, Request, RequestContext, Response, controller, route,
};
use serde_json::{Value, json};

use common::{HitsController, get, post_json};

fn hits_registry(
    configure: impl FnOnce(rostra::registry::RouteDecl<'_, HitsController>),
) -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    controller::<HitsController>(&mut registry).base_path("/things");
    configure(
        route::<HitsController>(&mut registry, "touch")
            .get("/")
            .handler(|c: Arc<HitsController>, args| c.touch(args)),
    );
    registry
}

fn dispatcher_with(
    registry: MetadataRegistry,
    container: Container,
) -> Dispatcher {
    Dispatcher::new(
        DispatcherConfig::new(registry)
            .container(container)
            .controller::<HitsController>(),
    )
    .unwrap()
}

fn shared_hits(container: &Container) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    container.register(Arc::new(HitsController { hits: hits.clone() }));
    hits
}

// ============================================================================
// Guards
// ============================================================================

#[tokio::test]
async fn denying_guard_yields_403_and_skips_the_handler() {
    let guard = Arc::new(RecordingGuard::denying());
    let registry = hits_registry(|r| {
        r.guard(GuardRef::instance(guard.clone()));
    });
    let container = Container::new();
    let hits = shared_hits(&container);

    let response = dispatcher_with(registry, container).dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.json_body().unwrap()["error"],
        "Access denied by guard"
    );
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(guard.calls(), 1);
}

#[tokio::test]
async fn controller_guard_denial_short_circuits_route_guards() {
    let denying = Arc::new(RecordingGuard::denying());
    let never_reached = Arc::new(RecordingGuard::allowing());

    let mut registry = MetadataRegistry::new();
    controller::<HitsController>(&mut registry)
        .base_path("/things")
        .guard(GuardRef::instance(denying.clone()));
    route::<HitsController>(&mut registry, "touch")
        .get("/")
        .guard(GuardRef::instance(never_reached.clone()))
        .handler(|c: Arc<HitsController>, args| c.touch(args));

    let container = Container::new();
    let response = dispatcher_with(registry, container).dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(denying.calls(), 1);
    assert_eq!(never_reached.calls(), 0);
}

#[tokio::test]
async fn allowing_guards_let_the_request_through() {
    let guard = Arc::new(RecordingGuard::allowing());
    let registry = hits_registry(|r| {
        r.guard(GuardRef::instance(guard.clone()));
    });
    let container = Container::new();
    let hits = shared_hits(&container);

    let response = dispatcher_with(registry, container).dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Container-resolved collaborators
// ============================================================================

struct CountingClassGuard {
    calls: AtomicUsize,
}

impl Injectable for CountingClassGuard {
    fn construct(_container: &Container) -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Guard for CountingClassGuard {
    async fn can_activate(&self, _ctx: &RequestContext) -> Result<bool, rostra::BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[tokio::test]
async fn class_referenced_guards_share_one_container_instance() {
    let mut registry = MetadataRegistry::new();
    controller::<HitsController>(&mut registry)
        .base_path("/things")
        .guard(GuardRef::class::<CountingClassGuard>());
    route::<HitsController>(&mut registry, "touch")
        .get("/")
        .guard(GuardRef::class::<CountingClassGuard>())
        .handler(|c: Arc<HitsController>, args| c.touch(args));

    let container = Container::new();
    let guard = Arc::new(CountingClassGuard {
        calls: AtomicUsize::new(0),
    });
    container.register(guard.clone());
    let hits = shared_hits(&container);

    let response = dispatcher_with(registry, container).dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    // Both mounts resolved to the one registered singleton.
    assert_eq!(guard.calls.load(Ordering::SeqCst), 2);
}

struct TagClassMiddleware;

impl Injectable for TagClassMiddleware {
    fn construct(_container: &Container) -> Self {
        TagClassMiddleware
    }
}

impl Middleware for TagClassMiddleware {
    async fn run(
        &self,
        ctx: &Arc<RequestContext>,
        next: Next<'_>,
    ) -> Result<Response, DispatchError> {
        Ok(next.run(ctx).await?.with_header("x-via", "container"))
    }
}

#[tokio::test]
async fn class_referenced_middleware_constructs_through_the_container() {
    let registry = hits_registry(|r| {
        r.middleware(MiddlewareRef::class::<TagClassMiddleware>());
    });
    let container = Container::new();
    let hits = shared_hits(&container);

    let response = dispatcher_with(registry, container).dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers.get("x-via").map(String::as_str),
        Some("container")
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Role authorization
// ============================================================================

#[tokio::test]
async fn authenticated_route_rejects_anonymous_with_401() {
    let registry = hits_registry(|r| {
        r.authenticated();
    });
    let response = dispatcher_with(registry, Container::new())
        .dispatch(get("/things"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json_body().unwrap()["error"],
        "Authentication required"
    );
}

#[tokio::test]
async fn authenticated_route_accepts_any_identity() {
    let registry = hits_registry(|r| {
        r.authenticated();
    });
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new(registry)
            .controller::<HitsController>()
            .auth_provider(StaticAuthProvider::new(AuthContext::new("u1"))),
    )
    .unwrap();
    let response = dispatcher.dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn role_mismatch_yields_403_with_required_roles() {
    let registry = hits_registry(|r| {
        r.roles(["admin"]);
    });
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new(registry)
            .controller::<HitsController>()
            .auth_provider(StaticAuthProvider::new(
                AuthContext::new("u1").with_roles(["user"]),
            )),
    )
    .unwrap();
    let response = dispatcher.dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let body = response.json_body().unwrap();
    assert_eq!(body["details"]["required_roles"], json!(["admin"]));
}

#[tokio::test]
async fn matching_role_passes() {
    let registry = hits_registry(|r| {
        r.roles(["admin", "owner"]);
    });
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new(registry)
            .controller::<HitsController>()
            .auth_provider(StaticAuthProvider::new(
                AuthContext::new("u1").with_roles(["admin"]),
            )),
    )
    .unwrap();
    let response = dispatcher.dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn roleless_route_ignores_authorization_entirely() {
    let registry = hits_registry(|_r| {});
    let response = dispatcher_with(registry, Container::new())
        .dispatch(get("/things"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

// ============================================================================
// Auth provider failures
// ============================================================================

#[tokio::test]
async fn provider_failure_is_not_fatal_on_a_roleless_route() {
    let registry = hits_registry(|_r| {});
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new(registry)
            .controller::<HitsController>()
            .auth_provider(FailingAuthProvider),
    )
    .unwrap();
    let response = dispatcher.dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn provider_failure_surfaces_as_401_only_via_role_checks() {
    let registry = hits_registry(|r| {
        r.authenticated();
    });
    let dispatcher = Dispatcher::new(
        DispatcherConfig::new(registry)
            .controller::<HitsController>()
            .auth_provider(FailingAuthProvider),
    )
    .unwrap();
    let response = dispatcher.dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Middleware
// ============================================================================

#[tokio::test]
async fn controller_middleware_runs_before_route_middleware() {
    let log = call_log();
    let mut registry = MetadataRegistry::new();
    controller::<HitsController>(&mut registry)
        .base_path("/things")
        .middleware(MiddlewareRef::instance(RecordingMiddleware::passing(
            "controller",
            log.clone(),
        )));
    route::<HitsController>(&mut registry, "touch")
        .get("/")
        .middleware(MiddlewareRef::instance(RecordingMiddleware::passing(
            "route",
            log.clone(),
        )))
        .handler(|c: Arc<HitsController>, args| c.touch(args));

    let response = dispatcher_with(registry, Container::new())
        .dispatch(get("/things"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(*log.lock().unwrap(), ["controller", "route"]);
}

#[tokio::test]
async fn short_circuiting_middleware_prevents_the_handler() {
    let log = call_log();
    let registry = hits_registry(|r| {
        r.middleware(MiddlewareRef::instance(RecordingMiddleware::blocking(
            "blocker",
            log.clone(),
            Response::new(StatusCode::TOO_MANY_REQUESTS),
        )));
    });
    let container = Container::new();
    let hits = shared_hits(&container);

    let response = dispatcher_with(registry, container).dispatch(get("/things")).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(*log.lock().unwrap(), ["blocker"]);
}

// ============================================================================
// Body cache and normalization
// ============================================================================

struct EchoController;

impl EchoController {
    async fn both(self: Arc<Self>, mut args: CallArgs) -> Result<Value, rostra::BoxError> {
        let whole: Value = args.take(0)?;
        let again: Value = args.take(1)?;
        Ok(json!({ "equal": whole == again, "name": whole["name"] }))
    }

    async fn created(self: Arc<Self>, _args: CallArgs) -> Response {
        Response::json(StatusCode::CREATED, &json!({ "made": true }))
    }

    async fn wrapped(self: Arc<Self>, _args: CallArgs) -> Result<Outcome, rostra::BoxError> {
        Ok(Outcome::Json(json!({ "plain": true })))
    }
}

impl Injectable for EchoController {
    fn construct(_container: &Container) -> Self {
        EchoController
    }
}

fn echo_dispatcher() -> Dispatcher {
    let mut registry = MetadataRegistry::new();
    controller::<EchoController>(&mut registry).base_path("/echo");
    route::<EchoController>(&mut registry, "both")
        .post("/both")
        .bind(ParamBinding::body(0))
        .bind(ParamBinding::body(1))
        .handler(|c: Arc<EchoController>, args| c.both(args));
    route::<EchoController>(&mut registry, "created")
        .post("/created")
        .handler(|c: Arc<EchoController>, args| c.created(args));
    route::<EchoController>(&mut registry, "wrapped")
        .post("/wrapped")
        .handler(|c: Arc<EchoController>, args| c.wrapped(args));

    Dispatcher::new(DispatcherConfig::new(registry).controller::<EchoController>()).unwrap()
}

#[tokio::test]
async fn two_body_bindings_observe_the_same_parse() {
    let dispatcher = echo_dispatcher();
    let response = dispatcher
        .dispatch(post_json("/echo/both", &json!({ "name": "Bob" })))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json_body(),
        Some(json!({ "equal": true, "name": "Bob" }))
    );
}

#[tokio::test]
async fn full_response_passes_through_unchanged() {
    let dispatcher = echo_dispatcher();
    let response = dispatcher.dispatch(post_json("/echo/created", &json!({}))).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json_body(), Some(json!({ "made": true })));
}

#[tokio::test]
async fn json_outcome_normalizes_to_200() {
    let dispatcher = echo_dispatcher();
    let response = dispatcher.dispatch(post_json("/echo/wrapped", &json!({}))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json_body(), Some(json!({ "plain": true })));
}

// ============================================================================
// Request and context bindings
// ============================================================================

struct InspectController;

impl Injectable for InspectController {
    fn construct(_container: &Container) -> Self {
        InspectController
    }
}

impl InspectController {
    async fn inspect(self: Arc<Self>, mut args: CallArgs) -> Result<Value, rostra::BoxError> {
        let request: Arc<Request> = args.take(0)?;
        let ctx: Arc<RequestContext> = args.take(1)?;
        Ok(json!({
            "tenant": request.header("x-tenant"),
            "id": ctx.param("id"),
        }))
    }
}

#[tokio::test]
async fn raw_request_and_context_bindings_reach_the_handler() {
    let mut registry = MetadataRegistry::new();
    controller::<InspectController>(&mut registry).base_path("/inspect");
    route::<InspectController>(&mut registry, "inspect")
        .get("/:id")
        .bind(ParamBinding::raw_request(0))
        .bind(ParamBinding::full_context(1))
        .handler(|c: Arc<InspectController>, args| c.inspect(args));

    let dispatcher =
        Dispatcher::new(DispatcherConfig::new(registry).controller::<InspectController>()).unwrap();
    let request = Request::builder(Method::GET, "/inspect/7")
        .header("x-tenant", "acme")
        .build();
    let response = dispatcher.dispatch(request).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json_body(),
        Some(json!({ "tenant": "acme", "id": "7" }))
    );
}
