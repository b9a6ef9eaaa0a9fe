//! HTTP method dispatch for a single path.

use http::Method;

/// Maps HTTP methods to handlers for one route.
///
/// Methods keep their registration order, which is also the order reported
/// by [`allowed_methods`](Self::allowed_methods).
///
/// # Example
///
/// ```rust
/// use stratum_router::MethodRouter;
/// use http::Method;
///
/// let router = MethodRouter::new().get("list").post("create");
///
/// assert_eq!(router.handler(&Method::GET), Some(&"list"));
/// assert_eq!(router.handler(&Method::DELETE), None);
/// assert_eq!(router.allowed_methods(), vec![Method::GET, Method::POST]);
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<H> {
    handlers: Vec<(Method, H)>,
}

impl<H> Default for MethodRouter<H> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<H> MethodRouter<H> {
    /// Creates an empty method router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a GET handler.
    #[must_use]
    pub fn get(self, handler: H) -> Self {
        self.on(Method::GET, handler)
    }

    /// Registers a POST handler.
    #[must_use]
    pub fn post(self, handler: H) -> Self {
        self.on(Method::POST, handler)
    }

    /// Registers a PUT handler.
    #[must_use]
    pub fn put(self, handler: H) -> Self {
        self.on(Method::PUT, handler)
    }

    /// Registers a DELETE handler.
    #[must_use]
    pub fn delete(self, handler: H) -> Self {
        self.on(Method::DELETE, handler)
    }

    /// Registers a PATCH handler.
    #[must_use]
    pub fn patch(self, handler: H) -> Self {
        self.on(Method::PATCH, handler)
    }

    /// Registers a handler for an arbitrary method.
    ///
    /// # Panics
    ///
    /// Panics if the method already has a handler.
    #[must_use]
    pub fn on(mut self, method: Method, handler: H) -> Self {
        self.insert(method, handler);
        self
    }

    /// Returns the handler for a method.
    #[must_use]
    pub fn handler(&self, method: &Method) -> Option<&H> {
        self.handlers
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, h)| h)
    }

    /// Returns true if any method is registered.
    #[must_use]
    pub fn has_any_method(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// Returns the registered methods in registration order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.handlers.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Moves every handler of `other` into this router.
    ///
    /// # Panics
    ///
    /// Panics if both routers define the same method.
    pub fn merge(&mut self, other: MethodRouter<H>) {
        for (method, handler) in other.handlers {
            self.insert(method, handler);
        }
    }

    fn insert(&mut self, method: Method, handler: H) {
        assert!(
            self.handler(&method).is_none(),
            "{method} handler registered twice for the same path"
        );
        self.handlers.push((method, handler));
    }
}
