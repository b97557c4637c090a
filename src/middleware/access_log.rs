use super::{Middleware, Next};
use crate::context::Context;

use std::time::Instant;

/// Logs one line per request under the `arbor::access` target once the inner
/// chain has returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl Middleware for AccessLog {
    fn call(&self, ctx: &mut Context, next: Next<'_>) {
        let start = Instant::now();
        next.run(ctx);
        info!(
            target: "arbor::access",
            "{} {} {} {}µs route={}",
            ctx.method(),
            ctx.path(),
            ctx.status().as_u16(),
            start.elapsed().as_micros(),
            ctx.route().unwrap_or("-"),
        );
    }
}
