//! Route introspection.

use crate::context::Context;
use crate::handler::Handler;

use http::{Method, StatusCode};
use serde::{Serialize, Serializer};
use std::sync::{Arc, OnceLock};

/// One registered route, as shown in the route listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn serialize_method<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

/// Serves the finalized route listing as JSON.
///
/// The listing is only known once the router is finalized, after this
/// handler has been registered, so it is filled in through a shared cell.
pub(crate) struct RouteListing {
    routes: Arc<OnceLock<Vec<RouteInfo>>>,
}

impl RouteListing {
    pub(crate) fn new(routes: Arc<OnceLock<Vec<RouteInfo>>>) -> Self {
        RouteListing { routes }
    }
}

impl Handler for RouteListing {
    fn call(&self, ctx: &mut Context) {
        let Some(routes) = self.routes.get() else {
            ctx.text(StatusCode::SERVICE_UNAVAILABLE, "route listing not ready");
            return;
        };

        if let Err(err) = ctx.json(StatusCode::OK, routes) {
            error!("failed to render route listing: {}", err);
            ctx.text(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error");
        }
    }
}
