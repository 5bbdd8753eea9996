//! Depot helpers for passing the authenticated identity between handlers.

use super::identity::Identity;
use crate::error::{ServiceError, ServiceResult};

pub mod depot_keys {
    pub const AUTHENTICATED_IDENTITY: &str = "__authenticated_identity";
}

/// Get the authenticated identity from the depot.
///
/// ## Errors
///
/// Returns `NotAuthenticated` if no identity was stored for this request.
pub fn get_identity_from_depot(depot: &salvo::Depot) -> ServiceResult<&Identity> {
    depot
        .get::<Identity>(depot_keys::AUTHENTICATED_IDENTITY)
        .map_err(|_e| ServiceError::NotAuthenticated)
}
