//! Building and serving.
//!
//! Routes are registered on a [`RouterBuilder`], which is the root
//! [`Branch`] of the application plus the router-wide settings. Finalizing
//! the builder resolves every branch, composes every middleware chain, and
//! produces a [`Router`]: a read-only dispatch structure that can be shared
//! between threads and serves requests without locking.
//!
//! ```
//! use arbor::{Context, Outcome, RouterBuilder};
//! use http::{Request, StatusCode};
//!
//! # fn main() -> Result<(), arbor::InsertError> {
//! let builder = RouterBuilder::new();
//! builder.get("/hello/{name}", |ctx: &mut Context| {
//!     let name = ctx.param("name").unwrap_or_default().to_owned();
//!     ctx.text(StatusCode::OK, &format!("Hello, {name}!"));
//! });
//! let router = builder.finalize()?;
//!
//! let request = Request::get("/hello/ferris").body(Vec::new()).unwrap();
//! let response = router.serve(request);
//! assert_eq!(response.body(), b"Hello, ferris!");
//!
//! let mut ctx = Context::with_request(Request::get("/hello").body(Vec::new()).unwrap());
//! assert_eq!(router.dispatch(&mut ctx), Outcome::NotFound);
//! # Ok(())
//! # }
//! ```

use crate::branch::{Branch, RouteOptions};
use crate::config::{RouterConfig, TrailingSlash};
use crate::context::{Context, Stage};
use crate::document::{RouteInfo, RouteListing};
use crate::error::{InsertError, MatchError};
use crate::handler::{self, BoxedHandler, Handler};
use crate::method::{Endpoint, MethodTable};
use crate::middleware::{self, Next};
use crate::params::Params;
use crate::path::clean_path;
use crate::pool::ContextPool;
use crate::tree::Tree;

use http::header::{self, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// What [`Router::dispatch`] did with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A registered handler ran.
    Matched,
    /// No route matches the path; the not-found handler ran.
    NotFound,
    /// The path matches, but not the method. Holds the methods registered
    /// for the path.
    MethodNotAllowed(Vec<Method>),
    /// An OPTIONS request was answered automatically. Holds the methods
    /// registered for the path.
    Options(Vec<Method>),
    /// The client was redirected to the given location.
    Redirect(String),
}

/// The root of the route tree, plus router-wide settings.
///
/// `RouterBuilder` dereferences to its root [`Branch`], so routes,
/// middleware and child branches are registered on it directly. Middleware
/// added to the builder wraps every registered route, but not the
/// not-found, method-not-allowed, OPTIONS and redirect responses.
pub struct RouterBuilder {
    root: Branch,
    config: RouterConfig,
    not_found: Option<BoxedHandler>,
    method_not_allowed: Option<BoxedHandler>,
    listing: Option<Arc<OnceLock<Vec<RouteInfo>>>>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for RouterBuilder {
    type Target = Branch;

    fn deref(&self) -> &Branch {
        &self.root
    }
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        RouterBuilder {
            root: Branch::root(),
            config,
            not_found: None,
            method_not_allowed: None,
            listing: None,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Sets the handler run when no route matches. A panic in it becomes a
    /// 500 response.
    pub fn not_found(&mut self, handler: impl Handler) -> &mut Self {
        self.not_found = Some(handler::boxed(handler));
        self
    }

    /// Sets the handler run when the path matches but the method does not.
    /// The router sets the `Allow` header after the handler returns, or
    /// after a panic in it has been turned into a 500.
    pub fn method_not_allowed(&mut self, handler: impl Handler) -> &mut Self {
        self.method_not_allowed = Some(handler::boxed(handler));
        self
    }

    /// Serves the list of registered routes as JSON at `path`.
    pub fn document(&mut self, path: &str) -> &mut Self {
        let routes = self.listing.get_or_insert_with(Default::default).clone();
        self.root.add_handler_with(
            Method::GET,
            path,
            RouteListing::new(routes),
            RouteOptions::new().describe("route listing"),
        );
        self
    }

    /// Resolves the branch tree and compiles it into a [`Router`].
    ///
    /// Every registration error surfaces here: invalid patterns, duplicate
    /// routes, conflicting parameters, and branches that were already
    /// finalized.
    pub fn finalize(self) -> Result<Router, InsertError> {
        let mut resolved = Vec::new();
        self.root.sinking(&mut resolved)?;

        let mut tree = Tree::with_case_sensitivity(self.config.case_sensitive);
        let mut routes = Vec::with_capacity(resolved.len());

        for route in resolved {
            let node = tree.insert(&route.path)?;
            tree.value_mut(node)
                .get_or_insert_with(MethodTable::default)
                .add(route.method.clone(), Endpoint::new(&route.path, route.handler))?;

            routes.push(RouteInfo {
                method: route.method,
                path: route.path,
                description: route.description,
            });
        }

        routes.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.method.as_str().cmp(b.method.as_str()))
        });

        if let Some(listing) = &self.listing {
            let _ = listing.set(routes.clone());
        }

        debug!(
            "router finalized: {} routes, {} nodes",
            routes.len(),
            tree.len()
        );

        Ok(Router {
            tree,
            not_found: self
                .not_found
                .unwrap_or_else(|| handler::boxed(handler::not_found)),
            method_not_allowed: self
                .method_not_allowed
                .unwrap_or_else(|| handler::boxed(handler::method_not_allowed)),
            routes,
            pool: ContextPool::new(self.config.pool_capacity),
            config: self.config,
        })
    }
}

/// A finalized, read-only router.
pub struct Router {
    tree: Tree<MethodTable>,
    config: RouterConfig,
    not_found: BoxedHandler,
    method_not_allowed: BoxedHandler,
    routes: Vec<RouteInfo>,
    pool: ContextPool,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Every registered route, sorted by path and then method.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// The pool contexts are drawn from by [`serve`](Router::serve).
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Looks up the endpoint for `method` and `path`, filling `params` with
    /// the captured segments.
    ///
    /// This is a plain lookup: no redirects, aliases or automatic OPTIONS
    /// replies are considered. On failure `params` is left empty.
    pub fn at(
        &self,
        method: &Method,
        path: &str,
        params: &mut Params,
    ) -> Result<&Endpoint, MatchError> {
        let Some(table) = self.lookup(path, params) else {
            let tsr = self.alternate(path, params).is_some();
            params.clear();
            return Err(MatchError::NotFound { tsr });
        };

        match table.resolve(method) {
            Some(endpoint) => Ok(endpoint),
            None => {
                params.clear();
                Err(MatchError::MethodNotAllowed {
                    allowed: table.allowed(),
                })
            }
        }
    }

    /// The methods registered for `path`, in registration order.
    pub fn allowed(&self, path: &str) -> Vec<Method> {
        let mut params = Params::new();
        self.lookup(path, &mut params)
            .map(MethodTable::allowed)
            .unwrap_or_default()
    }

    fn lookup(&self, path: &str, params: &mut Params) -> Option<&MethodTable> {
        self.tree.at(path, params).and_then(|node| self.tree.value(node))
    }

    /// Looks up `path` with its trailing slash toggled.
    fn alternate(&self, path: &str, params: &mut Params) -> Option<(String, &MethodTable)> {
        let alternate = match path.strip_suffix('/') {
            Some(stripped) => stripped.to_owned(),
            None => format!("{}/", path),
        };
        let table = self.lookup(&alternate, params)?;
        Some((alternate, table))
    }

    /// Acquires a pooled context for `request`, dispatches it, and returns
    /// the response. The context is reset and returned to the pool even if a
    /// handler panics.
    pub fn serve(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>> {
        self.serve_with(request, |_| {})
    }

    /// Like [`serve`](Router::serve), but lets the caller prepare the
    /// context first, e.g. to install a deadline or keep its cancel token.
    pub fn serve_with<F>(&self, request: Request<Vec<u8>>, prepare: F) -> Response<Vec<u8>>
    where
        F: FnOnce(&mut Context),
    {
        let mut ctx = self.pool.acquire(request);
        prepare(&mut *ctx);
        self.dispatch(&mut *ctx);
        ctx.take_response()
    }

    /// Routes the request held by `ctx` and runs whatever should answer it.
    pub fn dispatch(&self, ctx: &mut Context) -> Outcome {
        ctx.stage = Stage::Matching;
        let outcome = self.route(ctx);
        ctx.stage = Stage::Complete;
        trace!("{} {} -> {:?}", ctx.method(), ctx.path(), outcome);
        outcome
    }

    fn route(&self, ctx: &mut Context) -> Outcome {
        if let Some(table) = self.lookup(ctx.request.uri().path(), &mut ctx.params) {
            return self
                .dispatch_table(table, ctx)
                .unwrap_or_else(|| self.fallback(ctx));
        }

        let path = ctx.path().to_owned();
        let redirectable = *ctx.method() != Method::CONNECT;

        if redirectable && self.config.trailing_slash != TrailingSlash::Strict {
            if let Some((alternate, table)) = self.alternate(&path, &mut ctx.params) {
                if self.config.trailing_slash == TrailingSlash::Alias {
                    return self
                        .dispatch_table(table, ctx)
                        .unwrap_or_else(|| self.fallback(ctx));
                }
                return self.redirect(ctx, &alternate);
            }
        }

        if redirectable && self.config.redirect_fixed_path {
            let clean = clean_path(&path);
            if clean != path && self.lookup(&clean, &mut ctx.params).is_some() {
                return self.redirect(ctx, &clean);
            }
        }

        self.fallback(ctx)
    }

    /// Runs the endpoint registered for the request method, or answers with
    /// the methods the path does allow. Returns `None` when the request
    /// should fall through to not-found.
    fn dispatch_table(&self, table: &MethodTable, ctx: &mut Context) -> Option<Outcome> {
        ctx.stage = Stage::Dispatching;

        if let Some(endpoint) = table.resolve(ctx.method()) {
            ctx.route = Some(endpoint.pattern_arc());
            ctx.stage = Stage::Running;
            Next::new(&**endpoint.handler()).run(ctx);
            return Some(Outcome::Matched);
        }

        ctx.params.clear();

        if *ctx.method() == Method::OPTIONS && self.config.auto_options {
            ctx.clear_response();
            ctx.set_status(StatusCode::NO_CONTENT);
            self.set_allow(ctx, table);
            return Some(Outcome::Options(table.allowed()));
        }

        if self.config.handle_method_not_allowed {
            ctx.clear_response();
            middleware::guarded(ctx, |ctx| self.method_not_allowed.call(ctx));
            self.set_allow(ctx, table);
            return Some(Outcome::MethodNotAllowed(table.allowed()));
        }

        None
    }

    fn set_allow(&self, ctx: &mut Context, table: &MethodTable) {
        let allow = table.allow_header(self.config.auto_options);
        match HeaderValue::from_str(&allow) {
            Ok(value) => ctx.set_header(header::ALLOW, value),
            Err(_) => warn!("cannot encode Allow header '{}'", allow),
        }
    }

    fn redirect(&self, ctx: &mut Context, location: &str) -> Outcome {
        let status = match *ctx.method() {
            Method::GET | Method::HEAD => StatusCode::MOVED_PERMANENTLY,
            _ => StatusCode::PERMANENT_REDIRECT,
        };

        let location = match ctx.query() {
            Some(query) => format!("{}?{}", location, query),
            None => location.to_owned(),
        };

        ctx.params.clear();
        ctx.redirect(status, &location);
        Outcome::Redirect(location)
    }

    fn fallback(&self, ctx: &mut Context) -> Outcome {
        ctx.params.clear();
        ctx.clear_response();
        middleware::guarded(ctx, |ctx| self.not_found.call(ctx));
        Outcome::NotFound
    }
}
