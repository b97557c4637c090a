//! An embedded HTTP request router.
//!
//! Routes are path patterns made of `/`-separated segments. A segment is
//! either literal text, a named parameter `{name}` matching one non-empty
//! segment, or a trailing wildcard `{name:*}` matching the rest of the path:
//!
//! ```text
//! Pattern: /files/{owner}/{path:*}
//!
//! /files/ferris/notes.txt          match: owner="ferris", path="notes.txt"
//! /files/ferris/src/lib.rs         match: owner="ferris", path="src/lib.rs"
//! /files/ferris/                   no match
//! /files/ferris                    no match
//! ```
//!
//! At each position literal segments are preferred over parameters, and
//! parameters over wildcards. Two different parameter names, or a parameter
//! and a wildcard, at the same position are rejected when the router is
//! built.
//!
//! Routes and middleware are grouped into [`Branch`]es that can be assembled
//! independently and mounted under a prefix. Middleware on an outer branch
//! always runs outside middleware on an inner branch, and per-route
//! middleware runs innermost:
//!
//! ```
//! use arbor::middleware::{self, Next};
//! use arbor::{Context, RouteOptions, RouterBuilder};
//! use http::{Method, Request, StatusCode};
//!
//! # fn main() -> Result<(), arbor::InsertError> {
//! let builder = RouterBuilder::new();
//! builder.use_middleware(middleware::Recover);
//!
//! let api = builder.group("/api")?;
//! api.use_middleware(middleware::from_fn(|ctx: &mut Context, next: Next<'_>| {
//!     if ctx.header("x-api-key").is_none() {
//!         return ctx.text(StatusCode::UNAUTHORIZED, "missing key");
//!     }
//!     next.run(ctx);
//! }));
//! api.add_handler_with(
//!     Method::GET,
//!     "/users/{id}",
//!     |ctx: &mut Context| {
//!         let id = ctx.param("id").unwrap_or_default().to_owned();
//!         ctx.text(StatusCode::OK, &id);
//!     },
//!     RouteOptions::new().describe("fetch a user"),
//! );
//!
//! let router = builder.finalize()?;
//!
//! let request = Request::get("/api/users/42")
//!     .header("x-api-key", "secret")
//!     .body(Vec::new())
//!     .unwrap();
//! assert_eq!(router.serve(request).body(), b"42");
//!
//! let request = Request::get("/api/users/42").body(Vec::new()).unwrap();
//! assert_eq!(router.serve(request).status(), StatusCode::UNAUTHORIZED);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

mod branch;
mod config;
mod context;
mod document;
mod error;
mod method;
mod params;
mod path;
mod pool;
mod router;
mod tree;

pub mod handler;
pub mod middleware;

pub use branch::{Branch, RouteOptions};
pub use config::{RouterConfig, TrailingSlash};
pub use context::{CancelToken, Context, Stage};
pub use document::RouteInfo;
pub use error::{ConfigError, InsertError, MatchError};
pub use handler::{BoxedHandler, Handler};
pub use method::{Endpoint, MethodTable};
pub use middleware::{BoxedMiddleware, Middleware, Next};
pub use params::{Params, ParamsIter};
pub use path::clean_path;
pub use pool::{ContextPool, PooledContext};
pub use router::{Outcome, Router, RouterBuilder};
pub use tree::{NodeId, Segment, Tree};
