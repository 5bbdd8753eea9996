#![allow(clippy::unused_async, clippy::expect_used, dead_code)]
//! Test helpers for integration tests.
//!
//! Provides utilities for:
//! - Building a gated Salvo service from an inline YAML configuration
//! - A recording in-memory file tree, or a real `dav-server` tree in a temp dir
//! - Making HTTP requests with Basic credentials
//! - Asserting on responses

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use salvo::async_trait;
use salvo::http::header::HeaderName;
use salvo::http::{Method, ReqBody, StatusCode};
use salvo::prelude::*;
use salvo::test::{RequestBuilder, ResponseExt, TestClient};

use kunai_test::app::files::{FileHandler, LocalDavFiles};
use kunai_test::app::state::AppState;
use kunai_test::component::auth::{AuthBackend, AuthError, AuthResult, Identity};
use kunai_test::component::config::Settings;

pub use tracing;

/// Local users shared by most tests: alice is in `staff`, bob in nothing.
pub const USERS_YAML: &str = "\
users:
  local:
    - account: alice
      password: alice-pw
      group: staff
    - account: bob
      password: bob-pw
";

/// A request as seen by [`FakeFiles::serve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub depth: Option<String>,
}

/// ## Summary
/// In-memory file tree that records every request it serves.
#[derive(Default)]
pub struct FakeFiles {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, String>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl FakeFiles {
    #[must_use]
    pub fn new(dirs: &[&str], files: &[(&str, &str)]) -> Self {
        Self {
            dirs: dirs.iter().map(|d| normalize(d)).collect(),
            files: files
                .iter()
                .map(|(p, c)| (normalize(p), (*c).to_string()))
                .collect(),
            seen: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("seen lock").clone()
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

#[async_trait]
impl FileHandler for FakeFiles {
    async fn stat(&self, path: &str) -> std::io::Result<bool> {
        let path = normalize(path);
        if self.dirs.contains(&path) {
            Ok(true)
        } else if self.files.contains_key(&path) {
            Ok(false)
        } else {
            Err(std::io::ErrorKind::NotFound.into())
        }
    }

    async fn serve(&self, req: &mut Request, res: &mut Response) {
        let path = normalize(req.uri().path());
        self.seen.lock().expect("seen lock").push(SeenRequest {
            method: req.method().to_string(),
            path: path.clone(),
            depth: req
                .headers()
                .get("depth")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });

        match (req.method().as_str(), self.files.get(&path)) {
            ("GET" | "HEAD", Some(content)) => {
                res.status_code(StatusCode::OK);
                res.body(content.clone());
            }
            ("PROPFIND", _) if self.dirs.contains(&path) => {
                res.status_code(StatusCode::MULTI_STATUS);
                res.body(format!("<D:multistatus xmlns:D=\"DAV:\"><D:href>{path}</D:href></D:multistatus>"));
            }
            ("PUT", _) => {
                res.status_code(StatusCode::CREATED);
            }
            _ => {
                res.status_code(StatusCode::NOT_FOUND);
            }
        }
    }
}

fn settings(yaml: &str) -> Settings {
    Settings::from_yaml(yaml).expect("valid test settings")
}

/// ## Summary
/// Builds the full router over a [`FakeFiles`] tree.
///
/// ## Panics
/// Panics if the configuration is invalid.
pub fn fake_service(yaml: &str, files: FakeFiles) -> (Service, Arc<FakeFiles>) {
    let files = Arc::new(files);
    let state = AppState::from_settings(settings(yaml), files.clone()).expect("valid state");
    (
        Service::new(kunai_test::app::app::api::routes(Arc::new(state))),
        files,
    )
}

/// ## Summary
/// Backend that accepts any password and counts how often it is asked.
#[derive(Default)]
pub struct CountingBackend {
    pub unavailable: bool,
    calls: AtomicUsize,
}

impl CountingBackend {
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn login(&self, account: &str, _password: &str) -> AuthResult<Identity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(AuthError::BackendUnavailable("connection refused".to_string()));
        }
        Ok(Identity::anonymous(account))
    }

    async fn get_user(&self, account: &str) -> AuthResult<Identity> {
        Ok(Identity::anonymous(account))
    }

    async fn list_users(&self) -> AuthResult<Vec<Identity>> {
        Ok(Vec::new())
    }
}

/// ## Summary
/// Builds the full router over `files` with an explicit backend behind the cache.
///
/// ## Panics
/// Panics if the configuration is invalid.
pub fn service_with_backend(
    yaml: &str,
    backend: Arc<CountingBackend>,
    files: FakeFiles,
) -> Service {
    let state =
        AppState::with_backend(settings(yaml), backend, Arc::new(files)).expect("valid state");
    Service::new(kunai_test::app::app::api::routes(Arc::new(state)))
}

/// A temporary directory removed on drop.
pub struct TempTree {
    pub root: PathBuf,
}

impl TempTree {
    #[must_use]
    pub fn new(files: &[(&str, &str)]) -> Self {
        let root = std::env::temp_dir().join(format!("kunai-it-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("create temp tree");
        for (path, content) in files {
            let full = root.join(path.trim_start_matches('/'));
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("create parent");
            }
            std::fs::write(full, content).expect("write file");
        }
        Self { root }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.root.to_str().expect("utf-8 temp path")
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

/// ## Summary
/// Builds the full router over a real `dav-server` tree rooted at `tree`.
///
/// ## Panics
/// Panics if the configuration or tree is invalid.
pub fn dav_service(yaml: &str, tree: &TempTree, prefix: &str) -> Service {
    let files = Arc::new(LocalDavFiles::new(tree.path(), prefix).expect("valid tree"));
    let state = AppState::from_settings(settings(yaml), files).expect("valid state");
    Service::new(kunai_test::app::app::api::routes(Arc::new(state)))
}

/// Test request builder for constructing HTTP requests.
pub struct TestRequest {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl TestRequest {
    /// Creates a new test request with the given method and path.
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn head(path: &str) -> Self {
        Self::new(Method::HEAD, path)
    }

    #[must_use]
    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn propfind(path: &str) -> Self {
        Self::new(Method::from_bytes(b"PROPFIND").expect("Valid method"), path)
    }

    #[must_use]
    pub fn mkcol(path: &str) -> Self {
        Self::new(Method::from_bytes(b"MKCOL").expect("Valid method"), path)
    }

    /// Adds a header to the request.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the Depth header.
    #[must_use]
    pub fn depth(self, depth: &str) -> Self {
        self.header("Depth", depth)
    }

    /// Sets Basic credentials.
    #[must_use]
    pub fn basic_auth(self, account: &str, password: &str) -> Self {
        let token = STANDARD.encode(format!("{account}:{password}"));
        self.header("Authorization", &format!("Basic {token}"))
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sends the request to the test service and returns the response.
    pub async fn send(self, service: &Service) -> TestResponse {
        let url = format!("http://127.0.0.1:5800{}", self.path);

        let mut client = match self.method.as_str() {
            "GET" => TestClient::get(&url),
            "HEAD" => TestClient::head(&url),
            "PUT" => TestClient::put(&url),
            "DELETE" => TestClient::delete(&url),
            _ => RequestBuilder::new(&url, self.method.clone()),
        };

        for (name, value) in self.headers {
            if let Ok(header_name) = HeaderName::try_from(name.as_str()) {
                client = client.add_header(header_name, value, true);
            }
        }

        if let Some(body_bytes) = self.body {
            client = client.body(ReqBody::Once(body_bytes.into()));
        }

        TestResponse::from_response(client.send(service).await).await
    }

    /// ## Summary
    /// Sends the request with its path exactly as written.
    ///
    /// [`Self::send`] goes through a URL parser that resolves dot segments;
    /// this builds the salvo request directly so `..` and `%2e%2e` survive.
    pub async fn send_verbatim(self, service: &Service) -> TestResponse {
        let uri = http::Uri::try_from(format!("http://127.0.0.1:5800{}", self.path))
            .expect("valid request uri");

        let mut req = Request::new();
        *req.method_mut() = self.method;
        req.set_uri(uri);
        for (name, value) in self.headers {
            req.headers_mut().append(
                HeaderName::try_from(name.as_str()).expect("valid header name"),
                value.parse().expect("valid header value"),
            );
        }
        if let Some(body_bytes) = self.body {
            *req.body_mut() = ReqBody::Once(body_bytes.into());
        }

        TestResponse::from_response(service.handle(req).await).await
    }
}

impl TestResponse {
    async fn from_response(mut response: Response) -> Self {
        let status = response
            .status_code
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body: Vec<u8> = response.take_bytes(None).await.unwrap_or_default().to_vec();

        Self {
            status,
            headers,
            body,
        }
    }
}

/// Represents an HTTP test response for assertions.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Asserts that the response status matches the expected code.
    #[must_use]
    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.status, expected,
            "Expected status {expected} but got {}: {}",
            self.status,
            self.body_string()
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    #[must_use]
    pub fn assert_header(self, name: &str, expected: &str) -> Self {
        let value = self
            .get_header(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found in response"));
        assert_eq!(
            value, expected,
            "Header '{name}' expected '{expected}' but got '{value}'"
        );
        self
    }

    /// Asserts that no header with this name was sent.
    #[must_use]
    pub fn assert_no_header(self, name: &str) -> Self {
        assert!(
            self.get_header(name).is_none(),
            "Header '{name}' unexpectedly present"
        );
        self
    }

    /// Asserts that the response body contains the expected substring.
    #[must_use]
    pub fn assert_body_contains(self, expected: &str) -> Self {
        let body = String::from_utf8_lossy(&self.body);
        assert!(
            body.contains(expected),
            "Expected body to contain '{expected}' but got:\n{body}"
        );
        self
    }

    /// Asserts that the response body does not contain the given substring.
    #[must_use]
    pub fn assert_body_not_contains(self, unexpected: &str) -> Self {
        let body = String::from_utf8_lossy(&self.body);
        assert!(
            !body.contains(unexpected),
            "Expected body not to contain '{unexpected}' but got:\n{body}"
        );
        self
    }

    /// Asserts that the response body is empty.
    #[must_use]
    pub fn assert_body_empty(self) -> Self {
        assert!(
            self.body.is_empty(),
            "Expected empty body but got {} bytes",
            self.body.len()
        );
        self
    }

    /// Returns the body as a UTF-8 string.
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Gets a header value by name (case-insensitive).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
