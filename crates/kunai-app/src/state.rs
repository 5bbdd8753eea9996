use std::sync::Arc;
use std::time::Duration;

use salvo::async_trait;

use kunai_core::config::Settings;
use kunai_service::auth::{AuthBackend, CredentialCache, build_backend};
use kunai_service::authz::PrivilegeEvaluator;

use crate::error::{AppError, AppResult};
use crate::files::FileHandler;

/// ## Summary
/// Everything a request needs, built once at startup and shared read-only.
///
/// The credential cache is the only part with interior mutability.
pub struct AppState {
    pub settings: Settings,
    pub backend: Arc<CredentialCache>,
    pub evaluator: PrivilegeEvaluator,
    pub files: Arc<dyn FileHandler>,
}

impl AppState {
    /// ## Summary
    /// Builds the configured backend and rule index.
    ///
    /// ## Errors
    /// Returns an error if a local user or rule in `settings` is invalid.
    pub fn from_settings(settings: Settings, files: Arc<dyn FileHandler>) -> AppResult<Self> {
        let backend = build_backend(&settings)?;
        let evaluator = PrivilegeEvaluator::from_settings(&settings)?;
        Ok(Self {
            settings,
            backend,
            evaluator,
            files,
        })
    }

    /// ## Summary
    /// Like [`Self::from_settings`] but with an explicit backend, still cached.
    ///
    /// ## Errors
    /// Returns an error if a rule in `settings` is invalid.
    pub fn with_backend(
        settings: Settings,
        backend: Arc<dyn AuthBackend>,
        files: Arc<dyn FileHandler>,
    ) -> AppResult<Self> {
        let backend = Arc::new(CredentialCache::new(
            backend,
            Duration::from_secs(settings.auth.cache_ttl_secs),
            settings.auth.cache_salt.clone(),
        ));
        let evaluator = PrivilegeEvaluator::from_settings(&settings)?;
        Ok(Self {
            settings,
            backend,
            evaluator,
            files,
        })
    }
}

/// Injects the shared [`AppState`] into every request's depot.
pub struct StateHandler {
    pub state: Arc<AppState>,
}

#[async_trait]
impl salvo::Handler for StateHandler {
    async fn handle(
        &self,
        _req: &mut salvo::Request,
        depot: &mut salvo::Depot,
        _res: &mut salvo::Response,
        _ctrl: &mut salvo::FlowCtrl,
    ) {
        depot.inject(self.state.clone());
    }
}

/// ## Summary
/// Retrieves the application state from the depot.
///
/// ## Errors
/// Returns an error if the state is not found in the depot.
pub fn get_state_from_depot(depot: &salvo::Depot) -> AppResult<Arc<AppState>> {
    depot.obtain::<Arc<AppState>>().cloned().map_err(|_err| {
        AppError::CoreError(kunai_core::error::CoreError::InvariantViolation(
            "Application state not found in depot",
        ))
    })
}
