use crate::context::Context;

use http::StatusCode;
use std::sync::Arc;

/// A unit of work run against a request [`Context`].
///
/// Handlers communicate only through side effects on the context: they read
/// the request and its params, and write the response.
///
/// Any `Fn(&mut Context)` closure or function is a handler:
///
/// ```
/// use arbor::{Context, Handler};
/// use http::StatusCode;
///
/// fn hello(ctx: &mut Context) {
///     let name = ctx.param("name").unwrap_or("world").to_owned();
///     ctx.text(StatusCode::OK, &format!("Hello, {name}!"));
/// }
///
/// let handler: &dyn Handler = &hello;
/// let mut ctx = Context::new();
/// handler.call(&mut ctx);
/// assert_eq!(ctx.response().body(), b"Hello, world!");
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: &mut Context);
}

impl<F> Handler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Context) {
        self(ctx)
    }
}

/// A shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

/// Erases the type of a handler.
pub fn boxed<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

/// The fallback used when no route matches.
pub(crate) fn not_found(ctx: &mut Context) {
    ctx.text(StatusCode::NOT_FOUND, "404 Not Found");
}

/// The fallback used when the path matches but the method does not.
pub(crate) fn method_not_allowed(ctx: &mut Context) {
    ctx.text(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
}
