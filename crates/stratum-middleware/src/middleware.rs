//! Core middleware trait and the `Next` link.
//!
//! Every handler of the chain implements [`Middleware`]. A handler either
//! writes a response and returns (short-circuit) or calls
//! [`Next::run`] to delegate to the rest of the chain. The last link is a
//! no-op, so a handler that delegates past the end is harmless.
//!
//! # Example
//!
//! ```ignore
//! use stratum_middleware::{BoxFuture, Exchange, Middleware, Next};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn handle<'a>(&'a self, ex: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, ()> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             next.run(ex).await;
//!             tracing::debug!(elapsed = ?start.elapsed(), "request handled");
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::context::Exchange;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A handler in the middleware chain.
///
/// # Invariants
///
/// - Call `next.run()` at most once
/// - Do not keep references to the exchange after returning
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Handles the request, optionally delegating to `next`.
    fn handle<'a>(&'a self, ex: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, ()>;
}

/// The rest of the chain.
///
/// Consumed by [`run`](Self::run) so it can only be invoked once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    End,
}

impl<'a> Next<'a> {
    /// Creates a link invoking `middleware`, then `next`.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// The terminal no-op link.
    #[must_use]
    pub fn end() -> Self {
        Self {
            inner: NextInner::End,
        }
    }

    /// Returns true if this is the terminal link.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self.inner, NextInner::End)
    }

    /// Runs the rest of the chain.
    pub async fn run(self, ex: &mut Exchange) {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.handle(ex, *next).await,
            NextInner::End => {}
        }
    }
}

/// A middleware built from a closure.
///
/// # Example
///
/// ```ignore
/// let tag = FnMiddleware::new("caller", |ex, next| {
///     Box::pin(async move {
///         ex.state_mut().set_caller_id("batch");
///         next.run(ex).await;
///     })
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Exchange, Next<'a>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    /// Creates a named closure middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Exchange, Next<'a>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(&'a self, ex: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, ()> {
        (self.func)(ex, next)
    }
}
