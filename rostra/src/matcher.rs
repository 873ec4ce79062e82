//! Request-time route matching.
//!
//! A linear first-match scan over the compiled, specificity-sorted route
//! list. Sorting already encoded match priority, so the first pattern that
//! accepts the verb and path wins.

use std::collections::HashMap;

use http::Method;

use crate::loader::CompiledRoute;

/// A successful match: the winning route plus its extracted path parameters.
pub struct RouteMatch<'a> {
    /// The matched compiled route.
    pub route: &'a CompiledRoute,
    /// Path parameters keyed by declared name, raw (undecoded) segment text.
    pub params: HashMap<String, String>,
}

/// Find the first compiled route accepting this verb and path.
///
/// Route verbs never overlap with path priority: a verb mismatch on an
/// otherwise matching pattern simply lets the scan continue, and exhausting
/// the list yields `None` (a 404, never a verb-specific failure).
pub fn match_route<'a>(
    routes: &'a [CompiledRoute],
    method: &Method,
    path: &str,
) -> Option<RouteMatch<'a>> {
    for route in routes {
        if route.verb != *method {
            continue;
        }
        if let Some(captures) = route.pattern.matches(path) {
            let mut params = HashMap::new();
            let names = route.pattern.param_names();
            for (i, name) in names.iter().enumerate() {
                // Captures always pair one-to-one with declared names; the
                // empty-string fill keeps lookups total if they ever drift.
                let value = captures.get(i).cloned().unwrap_or_default();
                params.insert(name.clone(), value);
            }
            return Some(RouteMatch { route, params });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Container, Injectable};
    use crate::loader::load;
    use crate::registry::{ControllerHandle, MetadataRegistry, controller, route};
    use serde_json::json;
    use std::sync::Arc;

    struct Users;

    impl Injectable for Users {
        fn construct(_container: &Container) -> Self {
            Users
        }
    }

    fn routes() -> Vec<CompiledRoute> {
        let mut registry = MetadataRegistry::new();
        controller::<Users>(&mut registry).base_path("/users");
        let noop = |_users: Arc<Users>, _args: rostra_core::CallArgs| {
            std::future::ready(json!(null))
        };
        route::<Users>(&mut registry, "list").get("/").handler(noop);
        route::<Users>(&mut registry, "me").get("/me").handler(noop);
        route::<Users>(&mut registry, "by_id").get("/:id").handler(noop);
        route::<Users>(&mut registry, "create").post("/").handler(noop);

        let container = Container::new();
        load(&registry, &container, &[ControllerHandle::of::<Users>()], "").unwrap()
    }

    #[test]
    fn static_wins_over_param_for_same_shape() {
        let routes = routes();
        let m = match_route(&routes, &Method::GET, "/users/me").unwrap();
        assert_eq!(m.route.route.handler_name, "me");
        assert!(m.params.is_empty());
    }

    #[test]
    fn param_captures_raw_segment() {
        let routes = routes();
        let m = match_route(&routes, &Method::GET, "/users/42").unwrap();
        assert_eq!(m.route.route.handler_name, "by_id");
        assert_eq!(m.params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn verb_mismatch_is_no_match() {
        let routes = routes();
        assert!(match_route(&routes, &Method::DELETE, "/users").is_none());
    }

    #[test]
    fn verb_selects_between_same_path() {
        let routes = routes();
        let get = match_route(&routes, &Method::GET, "/users").unwrap();
        assert_eq!(get.route.route.handler_name, "list");
        let post = match_route(&routes, &Method::POST, "/users").unwrap();
        assert_eq!(post.route.route.handler_name, "create");
    }

    #[test]
    fn unknown_path_is_no_match() {
        let routes = routes();
        assert!(match_route(&routes, &Method::GET, "/orders").is_none());
    }
}
