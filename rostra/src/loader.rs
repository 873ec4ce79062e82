//! Controller loading and route compilation.
//!
//! Resolves controller singletons through the container, reads registry
//! metadata, compiles every route's full path, binds handlers to their
//! instances, and produces the specificity-sorted route list the matcher
//! scans at request time.

use std::cmp::Ordering;
use std::sync::Arc;

use http::Method;
use rostra_core::{DynGuard, DynMiddleware, LoadError, is_supported_verb};

use crate::container::Container;
use crate::path::{PathPattern, Segment, normalize};
use crate::registry::{
    BoundHandler, ControllerHandle, ControllerMetadata, MetadataRegistry, RouteMetadata,
};

/// One compiled route: everything dispatch needs, built once at startup.
#[derive(Clone)]
pub struct CompiledRoute {
    /// The compiled matcher over the full path (prefix + base path + route path).
    pub pattern: PathPattern,
    /// The route verb.
    pub verb: Method,
    /// The normalized full path, for logs and diagnostics.
    pub full_path: String,
    /// The handler, pre-bound to its controller instance.
    pub handler: BoundHandler,
    /// The route's metadata record.
    pub route: Arc<RouteMetadata>,
    /// The owning controller's metadata record.
    pub controller: Arc<ControllerMetadata>,
    /// Resolved guards: controller-level first, then route-level, each in
    /// declaration order.
    pub guards: Vec<Arc<dyn DynGuard>>,
    /// Resolved middleware: controller-level first, then route-level, each
    /// in declaration order.
    pub middleware: Vec<Arc<dyn DynMiddleware>>,
}

/// Compile and sort the routes of the given controllers.
///
/// A controller with no metadata is skipped with a warning so the
/// application still boots with partial routing. A route whose handler name
/// has no registered handler, or which never received a verb declaration, is
/// a programmer error and fails loading.
pub fn load(
    registry: &MetadataRegistry,
    container: &Container,
    controllers: &[ControllerHandle],
    prefix: &str,
) -> Result<Vec<CompiledRoute>, LoadError> {
    let mut routes = Vec::new();

    for handle in controllers {
        let Some(meta) = registry.controller_metadata(handle.type_id) else {
            tracing::warn!(
                controller = handle.name,
                "controller has no metadata, skipping its routes"
            );
            continue;
        };
        let controller_meta = Arc::new(meta.clone());
        let instance = handle.instantiate(container);

        let controller_guards: Vec<Arc<dyn DynGuard>> = meta
            .guards
            .iter()
            .map(|guard| guard.resolve(container))
            .collect();
        let controller_middleware: Vec<Arc<dyn DynMiddleware>> = meta
            .middleware
            .iter()
            .map(|middleware| middleware.resolve(container))
            .collect();

        for route_meta in registry.routes_for(handle.type_id) {
            let verb = route_meta.verb.clone().ok_or_else(|| LoadError::MissingVerb {
                controller: handle.name,
                handler: route_meta.handler_name.clone(),
            })?;
            if !is_supported_verb(&verb) {
                return Err(LoadError::UnsupportedVerb {
                    controller: handle.name,
                    handler: route_meta.handler_name.clone(),
                    verb,
                });
            }
            let unknown = || LoadError::UnknownHandler {
                controller: handle.name,
                handler: route_meta.handler_name.clone(),
            };
            let factory = registry
                .handler_factory(handle.type_id, &route_meta.handler_name)
                .ok_or_else(unknown)?;
            let handler = factory(instance.clone()).ok_or_else(unknown)?;

            let full_path = normalize([prefix, &meta.base_path, &route_meta.path]);
            let pattern = PathPattern::compile(&full_path);

            // Bindings resolve positionally; order them by argument index
            // here so dispatch never has to.
            let mut route_meta = route_meta.clone();
            route_meta.bindings.sort_by_key(|binding| binding.index);

            let mut guards = controller_guards.clone();
            guards.extend(route_meta.guards.iter().map(|g| g.resolve(container)));
            let mut middleware = controller_middleware.clone();
            middleware.extend(route_meta.middleware.iter().map(|m| m.resolve(container)));

            tracing::debug!(
                controller = handle.name,
                verb = %verb,
                path = %full_path,
                "compiled route"
            );

            routes.push(CompiledRoute {
                pattern,
                verb,
                full_path,
                handler,
                route: Arc::new(route_meta),
                controller: controller_meta.clone(),
                guards,
                middleware,
            });
        }
    }

    // Stable sort: equal-specificity routes keep declaration order, so the
    // compiled order is deterministic and re-sorting is a no-op.
    routes.sort_by(|a, b| compare_specificity(&a.pattern, &b.pattern));
    Ok(routes)
}

/// Order two patterns by match priority: more segments first, then more
/// static segments, then static-before-param position by position.
///
/// Comparing pattern source text or length instead is fragile (parameter
/// names of different lengths distort the order); the comparison is always
/// per segment.
pub fn compare_specificity(a: &PathPattern, b: &PathPattern) -> Ordering {
    b.segment_count()
        .cmp(&a.segment_count())
        .then_with(|| b.static_count().cmp(&a.static_count()))
        .then_with(|| {
            for (sa, sb) in a.segments().iter().zip(b.segments()) {
                match (sa, sb) {
                    (Segment::Static(_), Segment::Param(_)) => return Ordering::Less,
                    (Segment::Param(_), Segment::Static(_)) => return Ordering::Greater,
                    _ => {}
                }
            }
            Ordering::Equal
        })
}
