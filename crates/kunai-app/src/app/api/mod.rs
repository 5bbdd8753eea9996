mod app_specific;

use std::sync::Arc;

use salvo::Router;

use crate::files::ServeFiles;
use crate::middleware::gate::RequestGate;
use crate::state::{AppState, StateHandler};

// Re-export route constants from core
pub use kunai_core::constants::{
    APP_ROUTE_COMPONENT, APP_ROUTE_PREFIX, HEALTHCHECK_ROUTE_PREFIX, WHOAMI_ROUTE_PREFIX,
};

/// ## Summary
/// Constructs the root router: app endpoints first, then every other path
/// through the gate into the file tree.
#[must_use]
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .hoop(StateHandler { state })
        .push(app_specific::routes())
        .push(
            Router::with_path("{**rest}")
                .hoop(RequestGate::new())
                .goal(ServeFiles),
        )
}
