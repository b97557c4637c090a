use http::Method;
use thiserror::Error;

/// Represents errors that can occur while registering routes or finalizing a
/// router. All of them are fatal to startup.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum InsertError {
    /// Paths and mount prefixes must begin with `/`.
    #[error("invalid path '{0}': paths must begin with '/'")]
    InvalidPath(String),
    /// Parameters must be registered with a name.
    #[error("parameters must be registered with a name")]
    UnnamedParam,
    /// A parameter segment was not of the form `{name}` or `{name:*}`.
    #[error("malformed parameter segment '{0}'")]
    MalformedParam(String),
    /// A parameter used a kind other than `*`.
    #[error("unknown parameter kind '{kind}' in segment '{segment}'")]
    UnknownParamKind { segment: String, kind: String },
    /// Wildcard parameters are only allowed at the end of a path.
    #[error("wildcard parameters are only allowed at the end of a route")]
    InvalidWildcard,
    /// Two different parameters were registered at the same position, or a
    /// parameter and a wildcard share a node.
    #[error("parameter '{segment}' conflicts with previously registered '{with}'")]
    ParamConflict { segment: String, with: String },
    /// A parameter name appears more than once in a single route.
    #[error("parameter '{0}' appears more than once in the route")]
    DuplicateParam(String),
    /// The same method was registered twice for one path.
    #[error("handler for {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },
    /// A branch was mounted under a second parent.
    #[error("branch is already mounted under '{prefix}'")]
    BranchAlreadyMounted { prefix: String },
    /// A branch was mounted into itself or one of its descendants.
    #[error("branch cannot be mounted into its own subtree")]
    CyclicMount,
    /// The branch tree has already been compiled into a router.
    #[error("branch has already been finalized")]
    AlreadyFinalized,
    /// The root branch of a router builder was mounted into another branch.
    #[error("the root of a router cannot be mounted into another branch")]
    RootMount,
}

/// A failed match attempt.
///
/// ```
/// use arbor::{MatchError, RouterBuilder};
/// use http::Method;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let builder = RouterBuilder::new();
/// builder.get("/home", |_: &mut arbor::Context| {});
/// let router = builder.finalize()?;
///
/// let mut params = arbor::Params::new();
/// assert_eq!(
///     router.at(&Method::GET, "/foobar", &mut params).err(),
///     Some(MatchError::NotFound { tsr: false })
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum MatchError {
    /// No node matches the path.
    ///
    /// `tsr` is set when the same path with (or without) a trailing slash
    /// would have matched.
    #[error("matching route not found")]
    NotFound { tsr: bool },
    /// The path matched, but no handler is registered for the method.
    #[error("method not allowed, expected one of {allowed:?}")]
    MethodNotAllowed { allowed: Vec<Method> },
}

impl MatchError {
    /// Returns `true` if a route exists for the path with its trailing slash
    /// toggled.
    pub fn tsr(&self) -> bool {
        matches!(self, MatchError::NotFound { tsr: true })
    }
}

/// Errors produced while loading a [`RouterConfig`](crate::RouterConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse router configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
