//! Middleware chain construction.
//!
//! Handlers are collected in a [`ChainBuilder`] while the service is being
//! configured, then frozen into an immutable [`Chain`]. Running a chain
//! links the handlers front to back into [`Next`] values ending in the no-op
//! terminal link.

use std::fmt;
use std::sync::Arc;

use crate::context::Exchange;
use crate::middleware::{Middleware, Next};

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Ordered list of handlers under construction.
#[derive(Default, Clone)]
pub struct ChainBuilder {
    handlers: Vec<BoxedMiddleware>,
}

impl fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("handlers", &self.names())
            .finish()
    }
}

impl ChainBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler at the end.
    pub fn append<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.handlers.push(Arc::new(middleware));
        self
    }

    /// Adds a handler at the front.
    pub fn prepend<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.handlers.insert(0, Arc::new(middleware));
        self
    }

    /// Adds a shared handler at the end.
    pub fn append_shared(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        self.handlers.push(middleware);
        self
    }

    /// Returns the handler names in invocation order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handler was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Freezes the current handlers into a chain.
    ///
    /// The builder is left untouched, so building again yields an
    /// equivalent chain.
    #[must_use]
    pub fn build(&self) -> Chain {
        Chain {
            handlers: self.handlers.clone().into(),
        }
    }
}

/// Immutable, shareable chain of handlers.
#[derive(Clone)]
pub struct Chain {
    handlers: Arc<[BoxedMiddleware]>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("handlers", &self.names())
            .finish()
    }
}

impl Chain {
    /// Returns the first link; running it runs the whole chain.
    #[must_use]
    pub fn head(&self) -> Next<'_> {
        self.handlers
            .iter()
            .rev()
            .fold(Next::end(), |next, middleware| Next::new(middleware.as_ref(), next))
    }

    /// Runs every handler against `ex`.
    pub async fn run(&self, ex: &mut Exchange) {
        self.head().run(ex).await;
    }

    /// Returns the handler names in invocation order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if the chain has no handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
