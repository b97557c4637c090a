use super::{Middleware, Next};
use crate::context::Context;

use http::StatusCode;

/// Resolves the caller of a request, typically from a token or session
/// cookie.
pub trait Authenticator: Send + Sync + 'static {
    /// Stored in the context's user values; the type itself is the key
    /// handlers use to read it back with [`Context::get`].
    type Identity: Clone + Send + Sync + 'static;

    fn authenticate(&self, ctx: &Context) -> Option<Self::Identity>;
}

/// Runs an [`Authenticator`] and makes the identity it finds visible to every
/// inner layer.
///
/// In `required` mode a request without an identity is answered with
/// `401 Unauthorized` and the inner chain never runs.
pub struct Authenticate<A> {
    authenticator: A,
    required: bool,
}

impl<A: Authenticator> Authenticate<A> {
    /// Attaches the identity when there is one, and lets anonymous requests
    /// through.
    pub fn optional(authenticator: A) -> Self {
        Authenticate {
            authenticator,
            required: false,
        }
    }

    /// Rejects anonymous requests.
    pub fn required(authenticator: A) -> Self {
        Authenticate {
            authenticator,
            required: true,
        }
    }
}

impl<A: Authenticator> Middleware for Authenticate<A> {
    fn call(&self, ctx: &mut Context, next: Next<'_>) {
        match self.authenticator.authenticate(ctx) {
            Some(identity) => {
                ctx.insert(identity);
            }
            None if self.required => {
                debug!("rejecting anonymous request to {} {}", ctx.method(), ctx.path());
                ctx.text(StatusCode::UNAUTHORIZED, "401 Unauthorized");
                return;
            }
            None => {}
        }
        next.run(ctx);
    }
}
