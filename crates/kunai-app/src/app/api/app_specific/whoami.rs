use salvo::http::StatusError;
use salvo::prelude::Json;
use salvo::{Depot, Router, handler};

use kunai_core::constants::WHOAMI_ROUTE_COMPONENT;
use kunai_service::auth::Identity;
use kunai_service::auth::depot::get_identity_from_depot;

use crate::middleware::gate::RequestGate;

/// ## Summary
/// Returns the caller's identity as resolved by the authentication backend.
#[handler]
async fn whoami(depot: &Depot) -> Result<Json<Identity>, StatusError> {
    get_identity_from_depot(depot)
        .map(|identity| Json(identity.clone()))
        .map_err(|e| {
            tracing::error!(error = %e, "Identity missing behind the gate");
            StatusError::internal_server_error()
        })
}

#[must_use]
pub fn routes() -> Router {
    Router::with_path(WHOAMI_ROUTE_COMPONENT)
        .hoop(RequestGate::authenticate_only())
        .get(whoami)
}
