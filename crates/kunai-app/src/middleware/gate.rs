use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::uri::{PathAndQuery, Uri};
use salvo::http::header::{AUTHORIZATION, HeaderName, HeaderValue, WWW_AUTHENTICATE};
use salvo::http::{Method, StatusCode};
use salvo::{Depot, FlowCtrl, Request, Response};
use tracing::error;

use kunai_service::auth::AuthBackend;
use kunai_service::auth::depot::depot_keys;
use kunai_service::authz::is_read_only;

use super::audit::AuditRecord;
use crate::state::{AppState, get_state_from_depot};

/// ## Summary
/// Authentication and authorization gate in front of the file tree.
///
/// Requests without valid Basic credentials get a 401 challenge. The path is
/// then normalized; one that climbs above the root gets a 400, and the file
/// handler only ever sees the normalized form. Authenticated requests the
/// rules do not allow get a bare 403. Allowed requests have their
/// identity stored in the depot and continue to the next handler; every
/// request that got past authentication produces one audit event.
///
/// A GET on a directory is turned into a depth-1 PROPFIND, and HEAD responses
/// are stripped of their body.
pub struct RequestGate {
    authorize: bool,
}

impl RequestGate {
    #[must_use]
    pub const fn new() -> Self {
        Self { authorize: true }
    }

    /// Gate that only authenticates, for app endpoints outside the file tree.
    #[must_use]
    pub const fn authenticate_only() -> Self {
        Self { authorize: false }
    }
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits a `Basic` authorization header into account and password.
#[must_use]
pub fn basic_credentials(req: &Request) -> Option<(String, String)> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (account, password) = decoded.split_once(':')?;
    Some((account.to_string(), password.to_string()))
}

/// Caller address: first entry of the trusted forwarding header, else the peer.
#[must_use]
pub fn client_ip(req: &Request, trusted_header: Option<&str>) -> String {
    let forwarded = trusted_header
        .and_then(|name| req.headers().get(name))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let addr = req.remote_addr();
    if let Some(v4) = addr.as_ipv4() {
        v4.ip().to_string()
    } else if let Some(v6) = addr.as_ipv6() {
        v6.ip().to_string()
    } else {
        addr.to_string()
    }
}

fn challenge(res: &mut Response, realm: &str) {
    res.status_code(StatusCode::UNAUTHORIZED);
    let value = format!("Basic realm=\"{}\"", realm.replace('"', "'"));
    match HeaderValue::from_str(&value) {
        Ok(value) => {
            res.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        Err(e) => error!(error = %e, "Realm is not a valid header value"),
    }
    res.body("Not authorized");
}

/// Path below the mount prefix, if `path` is inside it.
fn strip_mount_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// ## Summary
/// Resolves `.`, `..` and empty segments of a decoded path.
///
/// Returns `None` when `..` climbs above the root. A trailing slash is kept.
#[must_use]
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if path.ends_with('/') && !segments.is_empty() {
        normalized.push('/');
    }
    Some(normalized)
}

/// Decodes and normalizes the request path, then rewrites the URI to the
/// re-encoded result so the file handler serves exactly the checked path.
fn canonicalize_request_path(req: &mut Request) -> Option<String> {
    let decoded = urlencoding::decode(req.uri().path()).ok()?;
    let normalized = normalize_path(&decoded)?;

    let encoded = normalized
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{encoded}?{query}"),
        None => encoded,
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    let uri = Uri::from_parts(parts).ok()?;
    req.set_uri(uri);
    Some(normalized)
}

/// Turns a GET on a directory into the equivalent depth-1 PROPFIND.
async fn normalize_directory_get(state: &AppState, req: &mut Request, path: &str) {
    let Some(relative) = strip_mount_prefix(path, &state.settings.server.prefix) else {
        return;
    };
    if !matches!(state.files.stat(relative).await, Ok(true)) {
        return;
    }
    let Ok(propfind) = Method::from_bytes(b"PROPFIND") else {
        return;
    };

    tracing::debug!(path, "GET on a directory, answering as PROPFIND");
    *req.method_mut() = propfind;
    if !req.headers().contains_key("depth") {
        req.headers_mut()
            .insert(HeaderName::from_static("depth"), HeaderValue::from_static("1"));
    }
}

#[salvo::async_trait]
impl salvo::Handler for RequestGate {
    #[tracing::instrument(skip(self, req, depot, res, ctrl), fields(
        method = %req.method(),
        path = %req.uri().path()
    ))]
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        ctrl: &mut FlowCtrl,
    ) {
        let state = match get_state_from_depot(depot) {
            Ok(state) => state,
            Err(e) => {
                error!(error = ?e, "Failed to get application state from depot");
                res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
                ctrl.skip_rest();
                return;
            }
        };

        let Some((account, password)) = basic_credentials(req) else {
            tracing::debug!("Missing or malformed Basic credentials");
            challenge(res, &state.settings.server.realm);
            ctrl.skip_rest();
            return;
        };

        let identity = match state.backend.login(&account, &password).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!(account = %account, error = %e, "Not authorized");
                challenge(res, &state.settings.server.realm);
                ctrl.skip_rest();
                return;
            }
        };

        if !self.authorize {
            depot.insert(depot_keys::AUTHENTICATED_IDENTITY, identity);
            return;
        }

        let method = req.method().clone();
        let remote = client_ip(req, state.settings.server.client_ip_header.as_deref());
        let audit = AuditRecord::capture(req, &identity.account, &remote, is_read_only(method.as_str()));

        let Some(path) = canonicalize_request_path(req) else {
            tracing::info!(account = %identity.account, remote = %remote, "Rejected path outside the tree");
            res.status_code(StatusCode::BAD_REQUEST);
            ctrl.skip_rest();
            audit.finish(res);
            return;
        };

        if let Err(e) = state.evaluator.authorize(&identity, method.as_str(), &path) {
            tracing::info!(account = %identity.account, remote = %remote, error = %e, "Forbidden");
            res.status_code(StatusCode::FORBIDDEN);
            ctrl.skip_rest();
            audit.finish(res);
            return;
        }

        if method == Method::GET {
            normalize_directory_get(&state, req, &path).await;
        }

        depot.insert(depot_keys::AUTHENTICATED_IDENTITY, identity);
        ctrl.call_next(req, depot, res).await;

        if method == Method::HEAD {
            drop(res.take_body());
        }
        audit.finish(res);
    }
}
