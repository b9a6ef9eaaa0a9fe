//! High-level router API.

use std::fmt;

use http::Method;

use crate::method_router::MethodRouter;
use crate::node::Node;
use crate::params::Params;

/// Outcome of resolving a request against a [`Router`].
#[derive(Debug)]
pub enum Resolution<'a, H> {
    /// A handler is registered for the path and method.
    Found(RouteMatch<'a, H>),
    /// The path exists but not for this method.
    MethodNotAllowed(Vec<Method>),
    /// No route matches the path.
    NotFound,
}

/// A matched route with its handler and extracted parameters.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    /// Handler registered for the route.
    pub handler: &'a H,
    /// Extracted path parameters.
    pub params: Params,
}

/// A radix tree router generic over its handler type.
///
/// Routes are matched in O(k) for a path of k segments. Static segments win
/// over parameters, and parameters win over wildcards, so
/// `/users/all/count` and `/users/{id}` can coexist.
///
/// An optional prefix is prepended to every registered pattern.
///
/// # Example
///
/// ```rust
/// use stratum_router::{MethodRouter, Resolution, Router};
/// use http::Method;
///
/// let mut router = Router::with_prefix("/api");
/// router.insert("/users", MethodRouter::new().get("list").post("create"));
/// router.insert("/users/{id}", MethodRouter::new().get("get"));
///
/// match router.resolve(&Method::GET, "/api/users/dave") {
///     Resolution::Found(m) => {
///         assert_eq!(*m.handler, "get");
///         assert_eq!(m.params.get("id"), Some("dave"));
///     }
///     other => panic!("unexpected {other:?}"),
/// }
///
/// assert!(matches!(
///     router.resolve(&Method::DELETE, "/api/users"),
///     Resolution::MethodNotAllowed(_)
/// ));
/// ```
pub struct Router<H> {
    root: Node<H>,
    prefix: String,
    route_count: usize,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix)
            .field("route_count", &self.route_count)
            .finish_non_exhaustive()
    }
}

impl<H> Router<H> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// Creates an empty router whose routes all live under `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            root: Node::root(),
            prefix: prefix.trim_end_matches('/').to_string(),
            route_count: 0,
        }
    }

    /// Returns the prefix applied to registered patterns.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Inserts a set of method handlers at `path`.
    ///
    /// # Panics
    ///
    /// Panics if a method is registered twice for the same path, if two
    /// patterns disagree on a parameter name at the same position, or if a
    /// wildcard is not the last segment.
    pub fn insert(&mut self, path: &str, methods: MethodRouter<H>) {
        let full = format!("{}{}", self.prefix, path);
        self.root.insert(&full, methods);
        self.route_count += 1;
    }

    /// Registers a single method handler at `path`.
    pub fn route(&mut self, method: Method, path: &str, handler: H) {
        self.insert(path, MethodRouter::new().on(method, handler));
    }

    /// Resolves a request path and method.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution<'_, H> {
        let Some((methods, params)) = self.root.match_path(path) else {
            return Resolution::NotFound;
        };
        match methods.handler(method) {
            Some(handler) => Resolution::Found(RouteMatch { handler, params }),
            None => Resolution::MethodNotAllowed(methods.allowed_methods()),
        }
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found<'a>(router: &'a Router<&'static str>, method: &Method, path: &str) -> Option<&'a str> {
        match router.resolve(method, path) {
            Resolution::Found(m) => Some(*m.handler),
            _ => None,
        }
    }

    #[test]
    fn test_router_new() {
        let router: Router<()> = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.prefix(), "");
    }

    #[test]
    fn test_router_route_and_resolve() {
        let mut router = Router::new();
        router.route(Method::GET, "/metrics", "metrics");
        assert_eq!(router.len(), 1);
        assert_eq!(found(&router, &Method::GET, "/metrics"), Some("metrics"));
    }

    #[test]
    fn test_router_not_found() {
        let mut router = Router::new();
        router.route(Method::GET, "/users", "list");
        assert!(matches!(
            router.resolve(&Method::GET, "/posts"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn test_router_method_not_allowed_lists_methods() {
        let mut router = Router::new();
        router.insert("/users", MethodRouter::new().get("list").post("create"));
        match router.resolve(&Method::PUT, "/users") {
            Resolution::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_router_prefix() {
        let mut router = Router::with_prefix("/svc/");
        router.route(Method::GET, "/users", "list");
        assert_eq!(router.prefix(), "/svc");
        assert_eq!(found(&router, &Method::GET, "/svc/users"), Some("list"));
        assert_eq!(found(&router, &Method::GET, "/users"), None);
    }

    #[test]
    fn test_router_trailing_slash() {
        let mut router = Router::new();
        router.route(Method::GET, "/users", "list");
        assert_eq!(found(&router, &Method::GET, "/users/"), Some("list"));
    }

    #[test]
    fn test_router_root_path() {
        let mut router = Router::new();
        router.route(Method::GET, "/", "root");
        assert_eq!(found(&router, &Method::GET, "/"), Some("root"));
    }

    #[test]
    fn test_router_collection_layout() {
        let mut router = Router::new();
        router.insert("/users", MethodRouter::new().get("list").post("create").delete("delete_all"));
        router.route(Method::GET, "/users/all/count", "count");
        router.insert(
            "/users/{id}",
            MethodRouter::new().get("get").put("update").delete("delete"),
        );
        router.route(Method::POST, "/users/{id}/{action}", "action");

        assert_eq!(found(&router, &Method::GET, "/users"), Some("list"));
        assert_eq!(found(&router, &Method::DELETE, "/users"), Some("delete_all"));
        assert_eq!(found(&router, &Method::GET, "/users/all/count"), Some("count"));
        assert_eq!(found(&router, &Method::PUT, "/users/dave"), Some("update"));
        assert_eq!(found(&router, &Method::POST, "/users/dave/reset"), Some("action"));
    }
}
