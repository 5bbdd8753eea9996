use std::path::{Component, Path, PathBuf};

use dav_server::DavHandler;
use dav_server::localfs::LocalFs;
use dav_server::memls::MemLs;
use http_body_util::{BodyExt, Full};
use salvo::async_trait;
use salvo::http::StatusCode;
use salvo::{Request, Response};

use super::FileHandler;
use crate::error::{AppError, AppResult};

/// ## Summary
/// WebDAV over a local directory, served by `dav-server`.
pub struct LocalDavFiles {
    root: PathBuf,
    dav: DavHandler,
}

impl LocalDavFiles {
    /// ## Summary
    /// Serves `scope` under the URL `prefix`.
    ///
    /// ## Errors
    /// Returns `FileRoot` if `scope` is not an existing directory.
    pub fn new(scope: &str, prefix: &str) -> AppResult<Self> {
        let root = std::fs::canonicalize(scope).map_err(|source| AppError::FileRoot {
            path: scope.to_string(),
            source,
        })?;
        if !root.is_dir() {
            return Err(AppError::FileRoot {
                path: scope.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        let mut builder = DavHandler::builder()
            .filesystem(LocalFs::new(&root, false, false, false))
            .locksystem(MemLs::new());
        let prefix = prefix.trim_end_matches('/');
        if !prefix.is_empty() {
            builder = builder.strip_prefix(prefix.to_string());
        }

        tracing::info!(root = %root.display(), prefix, "Serving local file tree");
        Ok(Self {
            root,
            dav: builder.build_handler(),
        })
    }

    /// Resolves a tree path below the root, ignoring `..` and root components.
    fn resolve(&self, path: &str) -> PathBuf {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            if let Component::Normal(part) = component {
                resolved.push(part);
            }
        }
        resolved
    }
}

#[async_trait]
impl FileHandler for LocalDavFiles {
    async fn stat(&self, path: &str) -> std::io::Result<bool> {
        Ok(tokio::fs::metadata(self.resolve(path)).await?.is_dir())
    }

    async fn serve(&self, req: &mut Request, res: &mut Response) {
        let payload = match req.take_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                res.status_code(StatusCode::BAD_REQUEST);
                return;
            }
        };

        let mut builder = http::Request::builder()
            .method(req.method().clone())
            .uri(req.uri().clone())
            .version(req.version());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(req.headers().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let dav_req = match builder.body(Full::new(payload)) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Failed to rebuild request for the DAV handler");
                res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
                return;
            }
        };

        let (parts, body) = self.dav.handle(dav_req).await.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::error!(error = %e, "DAV response body failed");
                res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
                return;
            }
        };

        res.status_code(parts.status);
        for (name, value) in &parts.headers {
            res.headers_mut().append(name, value.clone());
        }
        res.body(bytes);
    }
}
