use crate::context::Context;
use crate::error::InsertError;
use crate::handler::BoxedHandler;

use http::Method;
use std::fmt;
use std::sync::Arc;

/// A registered route: its fully composed handler and the pattern it was
/// registered under.
#[derive(Clone)]
pub struct Endpoint {
    handler: BoxedHandler,
    pattern: Arc<str>,
}

impl Endpoint {
    pub fn new(pattern: &str, handler: BoxedHandler) -> Self {
        Endpoint {
            handler,
            pattern: pattern.into(),
        }
    }

    /// The route pattern, e.g. `/users/{id}`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub(crate) fn pattern_arc(&self) -> Arc<str> {
        self.pattern.clone()
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Runs the composed handler.
    pub fn call(&self, ctx: &mut Context) {
        self.handler.call(ctx)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// The handlers registered at one node of the tree, keyed by method.
///
/// Methods are kept in registration order, which is also the order they are
/// listed in `Allow` headers.
#[derive(Clone, Debug, Default)]
pub struct MethodTable {
    entries: Vec<(Method, Endpoint)>,
}

impl MethodTable {
    /// Registers the endpoint for `method`. Each method can be registered
    /// once per node.
    pub fn add(&mut self, method: Method, endpoint: Endpoint) -> Result<(), InsertError> {
        if self.entries.iter().any(|(m, _)| *m == method) {
            return Err(InsertError::DuplicateRoute {
                method,
                path: endpoint.pattern().to_owned(),
            });
        }
        self.entries.push((method, endpoint));
        Ok(())
    }

    /// Returns the endpoint for `method`, if one is registered.
    pub fn resolve(&self, method: &Method) -> Option<&Endpoint> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, endpoint)| endpoint)
    }

    /// The methods registered at this node.
    pub fn allowed(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Formats the registered methods for an `Allow` header, adding
    /// `OPTIONS` when the router answers it automatically.
    pub fn allow_header(&self, with_options: bool) -> String {
        let mut allow = self
            .entries
            .iter()
            .map(|(m, _)| m.as_str())
            .collect::<Vec<_>>();

        if with_options && !allow.contains(&"OPTIONS") {
            allow.push("OPTIONS");
        }

        allow.join(", ")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
