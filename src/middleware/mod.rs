//! Middleware wrap a handler to run code before it, after it, or instead of
//! it.
//!
//! A chain is composed once, when the router is finalized. The first
//! middleware in a list is the outermost: it runs first and regains control
//! last.
//!
//! ```
//! use arbor::middleware::{self, BoxedMiddleware, Next};
//! use arbor::{handler, Context, Handler};
//! use std::sync::Arc;
//!
//! let log: BoxedMiddleware = Arc::new(middleware::from_fn(|ctx: &mut Context, next: Next<'_>| {
//!     ctx.insert(String::from("seen"));
//!     next.run(ctx);
//! }));
//!
//! let chain = middleware::wrap(
//!     &[log],
//!     handler::boxed(|ctx: &mut Context| {
//!         assert_eq!(ctx.get::<String>().map(String::as_str), Some("seen"));
//!     }),
//! );
//! chain.call(&mut Context::new());
//! ```

mod access_log;
mod auth;
mod rate_limit;
mod recover;

pub use access_log::AccessLog;
pub use auth::{Authenticate, Authenticator};
pub use rate_limit::RateLimit;
pub use recover::Recover;

pub(crate) use recover::guarded;

use crate::context::Context;
use crate::handler::{BoxedHandler, Handler};

use std::sync::Arc;

/// Code that runs around the rest of a handler chain.
///
/// Calling [`Next::run`] continues to the inner layers; returning without
/// calling it short-circuits the chain, leaving whatever response the
/// middleware wrote.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, ctx: &mut Context, next: Next<'_>);
}

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The remainder of the chain below a middleware.
pub struct Next<'a> {
    inner: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(inner: &'a dyn Handler) -> Self {
        Next { inner }
    }

    /// Runs the inner layers, unless the request has been cancelled.
    pub fn run(self, ctx: &mut Context) {
        if ctx.is_cancelled() {
            debug!("{} {} cancelled, skipping the inner chain", ctx.method(), ctx.path());
            return;
        }
        self.inner.call(ctx);
    }
}

struct Layer {
    middleware: BoxedMiddleware,
    inner: BoxedHandler,
}

impl Handler for Layer {
    fn call(&self, ctx: &mut Context) {
        self.middleware.call(ctx, Next::new(&*self.inner));
    }
}

/// Wraps `handler` in `middleware`, outermost first.
pub fn wrap(middleware: &[BoxedMiddleware], handler: BoxedHandler) -> BoxedHandler {
    middleware.iter().rev().fold(handler, |inner, middleware| {
        Arc::new(Layer {
            middleware: middleware.clone(),
            inner,
        })
    })
}

/// Middleware backed by a closure. See [`from_fn`].
pub struct FromFn<F>(F);

/// Turns a closure into a middleware.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: Fn(&mut Context, Next<'_>) + Send + Sync + 'static,
{
    FromFn(f)
}

impl<F> Middleware for FromFn<F>
where
    F: Fn(&mut Context, Next<'_>) + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Context, next: Next<'_>) {
        (self.0)(ctx, next)
    }
}
