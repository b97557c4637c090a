use super::{Middleware, Next};
use crate::context::Context;

use http::StatusCode;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Converts a panic anywhere below it into a `500 Internal Server Error`.
///
/// Register it first so it wraps every other layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recover;

impl Middleware for Recover {
    fn call(&self, ctx: &mut Context, next: Next<'_>) {
        guarded(ctx, |ctx| next.run(ctx));
    }
}

/// Runs `f`, replacing the response with a 500 if it panics.
pub(crate) fn guarded(ctx: &mut Context, f: impl FnOnce(&mut Context)) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(ctx))) {
        error!(
            "handler for {} {} panicked: {}",
            ctx.method(),
            ctx.path(),
            panic_message(&*payload)
        );
        ctx.text(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
