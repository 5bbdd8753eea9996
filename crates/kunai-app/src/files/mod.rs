//! The file tree behind the gate.
//!
//! [`FileHandler`] is the only thing the gate needs from the protocol layer:
//! a directory probe for GET normalization and a way to serve the request.

pub mod local;

use salvo::async_trait;
use salvo::http::StatusCode;
use salvo::{Depot, FlowCtrl, Handler, Request, Response};

use crate::state::get_state_from_depot;

pub use local::LocalDavFiles;

#[async_trait]
pub trait FileHandler: Send + Sync {
    /// ## Summary
    /// Reports whether `path`, relative to the root of the tree, is a directory.
    ///
    /// ## Errors
    /// Returns the underlying I/O error, e.g. `NotFound` for a missing path.
    async fn stat(&self, path: &str) -> std::io::Result<bool>;

    /// Serves the request, writing status, headers and body into `res`.
    async fn serve(&self, req: &mut Request, res: &mut Response);
}

/// ## Summary
/// Goal handler passing the request to the configured [`FileHandler`].
pub struct ServeFiles;

#[async_trait]
impl Handler for ServeFiles {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        _ctrl: &mut FlowCtrl,
    ) {
        match get_state_from_depot(depot) {
            Ok(state) => state.files.serve(req, res).await,
            Err(e) => {
                tracing::error!(error = ?e, "Application state missing from depot");
                res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}
