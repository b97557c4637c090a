//! Router behavior switches.
//!
//! The defaults suit most applications. Deployments that want the switches
//! outside the binary can load them from TOML:
//!
//! ```
//! use arbor::{RouterConfig, TrailingSlash};
//!
//! let config = RouterConfig::from_toml_str(
//!     r#"
//!     trailing_slash = "strict"
//!     pool_capacity = 64
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.trailing_slash, TrailingSlash::Strict);
//! assert_eq!(config.pool_capacity, 64);
//! assert!(config.case_sensitive);
//! ```

use crate::error::ConfigError;

use serde::{Deserialize, Serialize};

/// What to do with a request whose path only differs from a registered route
/// by a trailing slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingSlash {
    /// Redirect to the registered form: 301 for GET and HEAD, 308 otherwise.
    #[default]
    Redirect,
    /// Serve the registered route directly.
    Alias,
    /// Treat the two forms as different paths.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Compare literal segments exactly. When false, ASCII case is ignored.
    pub case_sensitive: bool,
    pub trailing_slash: TrailingSlash,
    /// Redirect requests for unclean paths (`//a/./b/../c`) to their
    /// cleaned form when that form matches a route.
    pub redirect_fixed_path: bool,
    /// Answer OPTIONS requests for known paths with the allowed methods,
    /// unless an OPTIONS handler is registered.
    pub auto_options: bool,
    /// Answer 405 with an `Allow` header when the path matches but the
    /// method does not. When false such requests fall through to not-found.
    pub handle_method_not_allowed: bool,
    /// Maximum number of idle contexts kept for reuse.
    pub pool_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            case_sensitive: true,
            trailing_slash: TrailingSlash::Redirect,
            redirect_fixed_path: false,
            auto_options: true,
            handle_method_not_allowed: true,
            pool_capacity: 1024,
        }
    }
}

impl RouterConfig {
    /// Parses a configuration, filling omitted fields with their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}
