//! Detachable route namespaces.
//!
//! A [`Branch`] collects handlers and middleware under a prefix and can be
//! built in isolation, then mounted into another branch (or a
//! [`RouterBuilder`](crate::RouterBuilder)) by whoever composes the
//! application:
//!
//! ```
//! use arbor::{Branch, Context, RouterBuilder};
//! use http::{Method, StatusCode};
//!
//! fn rbac() -> Branch {
//!     let branch = Branch::new();
//!     branch.get("/roles", |ctx: &mut Context| ctx.text(StatusCode::OK, "roles"));
//!     branch
//! }
//!
//! # fn main() -> Result<(), arbor::InsertError> {
//! let root = RouterBuilder::new();
//! root.mount("/rbac", &rbac())?;
//! let router = root.finalize()?;
//!
//! let mut params = arbor::Params::new();
//! assert!(router.at(&Method::GET, "/rbac/roles", &mut params).is_ok());
//! # Ok(())
//! # }
//! ```
//!
//! Finalizing walks the tree twice. Sinking recurses into every child before
//! the parent's own routes are looked at, so each subtree is resolved before
//! its parent consumes it. Rising then carries each route up the parent
//! links: at every level the level's prefix is prepended to the path and the
//! level's middleware is wrapped around the handler, outside anything the
//! levels below applied.

use crate::error::InsertError;
use crate::handler::{self, BoxedHandler, Handler};
use crate::middleware::{self, BoxedMiddleware, Middleware};

use http::Method;
use std::cell::{RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Per-route settings: middleware that runs innermost, right around the
/// handler, and an optional description for the route listing.
#[derive(Clone, Default)]
pub struct RouteOptions {
    middleware: Vec<BoxedMiddleware>,
    description: Option<String>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a local middleware. Local middleware run in the order added.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Sets the description shown in the route listing.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Detached,
    Mounted,
    Finalized,
}

struct Registration {
    method: Method,
    path: String,
    handler: BoxedHandler,
    options: RouteOptions,
}

struct Inner {
    prefix: String,
    middleware: Vec<BoxedMiddleware>,
    routes: Vec<Registration>,
    children: Vec<Branch>,
    // Only used to walk upward while rising; ownership flows downward.
    parent: Weak<RefCell<Inner>>,
    state: State,
    root: bool,
}

/// A route resolved against every level above it.
pub(crate) struct Resolved {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) handler: BoxedHandler,
    pub(crate) description: Option<String>,
}

/// A composable unit of route and middleware registrations.
///
/// `Branch` is a cheap handle: clones refer to the same branch. A branch can
/// be mounted into at most one parent, and is consumed by the first
/// finalize that reaches it.
#[derive(Clone)]
pub struct Branch {
    inner: Rc<RefCell<Inner>>,
}

impl Default for Branch {
    fn default() -> Self {
        Self::new()
    }
}

impl Branch {
    pub fn new() -> Self {
        Self::with_root(false)
    }

    /// The root branch of a router builder. It can never be mounted.
    pub(crate) fn root() -> Self {
        Self::with_root(true)
    }

    fn with_root(root: bool) -> Self {
        Branch {
            inner: Rc::new(RefCell::new(Inner {
                prefix: String::new(),
                middleware: Vec::new(),
                routes: Vec::new(),
                children: Vec::new(),
                parent: Weak::new(),
                state: State::Detached,
                root,
            })),
        }
    }

    /// Borrows the branch for a new registration.
    fn registering(&self) -> RefMut<'_, Inner> {
        let inner = self.inner.borrow_mut();
        if inner.state == State::Finalized {
            panic!(
                "branch '{}' has already been finalized and cannot take new registrations",
                inner.prefix
            );
        }
        inner
    }

    /// The prefix this branch is mounted under; empty while detached.
    pub fn prefix(&self) -> String {
        self.inner.borrow().prefix.clone()
    }

    /// Returns `true` once the branch has a parent.
    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().parent.strong_count() > 0
    }

    /// Adds middleware that wraps every route of this branch and its
    /// descendants. Middleware run in the order added.
    ///
    /// # Panics
    ///
    /// Panics if the branch has already been finalized.
    pub fn use_middleware(&self, middleware: impl Middleware) -> &Self {
        self.registering().middleware.push(Arc::new(middleware));
        self
    }

    /// Registers a handler for `method` at `path`, relative to this branch.
    ///
    /// Conflicts are reported when the router is finalized.
    pub fn add_handler(&self, method: Method, path: &str, handler: impl Handler) -> &Self {
        self.add_handler_with(method, path, handler, RouteOptions::default())
    }

    /// Registers a handler with local middleware and documentation.
    ///
    /// # Panics
    ///
    /// Panics if the branch has already been finalized.
    pub fn add_handler_with(
        &self,
        method: Method,
        path: &str,
        handler: impl Handler,
        options: RouteOptions,
    ) -> &Self {
        self.registering().routes.push(Registration {
            method,
            path: path.to_owned(),
            handler: handler::boxed(handler),
            options,
        });
        self
    }

    /// Register a handler for GET requests
    pub fn get(&self, path: &str, handler: impl Handler) -> &Self {
        self.add_handler(Method::GET, path, handler)
    }

    /// Register a handler for HEAD requests
    pub fn head(&self, path: &str, handler: impl Handler) -> &Self {
        self.add_handler(Method::HEAD, path, handler)
    }

    /// Register a handler for OPTIONS requests
    pub fn options(&self, path: &str, handler: impl Handler) -> &Self {
        self.add_handler(Method::OPTIONS, path, handler)
    }

    /// Register a handler for POST requests
    pub fn post(&self, path: &str, handler: impl Handler) -> &Self {
        self.add_handler(Method::POST, path, handler)
    }

    /// Register a handler for PUT requests
    pub fn put(&self, path: &str, handler: impl Handler) -> &Self {
        self.add_handler(Method::PUT, path, handler)
    }

    /// Register a handler for PATCH requests
    pub fn patch(&self, path: &str, handler: impl Handler) -> &Self {
        self.add_handler(Method::PATCH, path, handler)
    }

    /// Register a handler for DELETE requests
    pub fn delete(&self, path: &str, handler: impl Handler) -> &Self {
        self.add_handler(Method::DELETE, path, handler)
    }

    /// Mounts `child` under `prefix`. A trailing `/` on the prefix is ignored.
    pub fn mount(&self, prefix: &str, child: &Branch) -> Result<(), InsertError> {
        if !prefix.starts_with('/') {
            return Err(InsertError::InvalidPath(prefix.to_owned()));
        }

        if child.inner.borrow().root {
            return Err(InsertError::RootMount);
        }

        if self.is_within(child) {
            return Err(InsertError::CyclicMount);
        }

        if self.inner.borrow().state == State::Finalized {
            return Err(InsertError::AlreadyFinalized);
        }

        {
            let mut inner = child.inner.borrow_mut();
            match inner.state {
                State::Mounted => {
                    return Err(InsertError::BranchAlreadyMounted {
                        prefix: inner.prefix.clone(),
                    })
                }
                State::Finalized => return Err(InsertError::AlreadyFinalized),
                State::Detached => {}
            }

            inner.prefix = prefix.trim_end_matches('/').to_owned();
            inner.parent = Rc::downgrade(&self.inner);
            inner.state = State::Mounted;
        }

        self.inner.borrow_mut().children.push(child.clone());
        debug!("mounted branch under '{}'", prefix);
        Ok(())
    }

    /// Creates a new branch mounted under `prefix`.
    pub fn group(&self, prefix: &str) -> Result<Branch, InsertError> {
        let group = Branch::new();
        self.mount(prefix, &group)?;
        Ok(group)
    }

    /// Returns `true` if `self` is `other` or one of its descendants.
    fn is_within(&self, other: &Branch) -> bool {
        let mut current = Some(self.inner.clone());
        while let Some(node) = current {
            if Rc::ptr_eq(&node, &other.inner) {
                return true;
            }
            current = node.borrow().parent.upgrade();
        }
        false
    }

    /// Resolves this branch and all of its descendants, pushing every route
    /// that reaches the top of the tree into `sink`.
    pub(crate) fn sinking(&self, sink: &mut Vec<Resolved>) -> Result<(), InsertError> {
        let children = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == State::Finalized {
                return Err(InsertError::AlreadyFinalized);
            }
            inner.state = State::Finalized;
            inner.children.clone()
        };

        for child in &children {
            child.sinking(sink)?;
        }

        let inner = self.inner.borrow();
        for route in &inner.routes {
            if !route.path.starts_with('/') {
                return Err(InsertError::InvalidPath(route.path.clone()));
            }

            let handler = middleware::wrap(&route.options.middleware, route.handler.clone());
            self.rising(
                Resolved {
                    method: route.method.clone(),
                    path: route.path.clone(),
                    handler,
                    description: route.options.description.clone(),
                },
                sink,
            );
        }

        Ok(())
    }

    fn rising(&self, mut route: Resolved, sink: &mut Vec<Resolved>) {
        let parent = {
            let inner = self.inner.borrow();
            route.handler = middleware::wrap(&inner.middleware, route.handler);
            route.path.insert_str(0, &inner.prefix);
            inner.parent.upgrade()
        };

        match parent {
            Some(inner) => Branch { inner }.rising(route, sink),
            None => {
                trace!("{} {} reached the root", route.method, route.path);
                sink.push(route);
            }
        }
    }
}
