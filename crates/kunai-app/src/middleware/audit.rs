use std::collections::BTreeMap;

use salvo::http::{ResBody, StatusCode};
use salvo::{Request, Response};

/// Headers never written to the audit log.
const EXCLUDED_HEADERS: &[&str] = &[
    "authorization",
    "accept-language",
    "content-length",
    "accept",
    "connection",
    "accept-encoding",
    "content-type",
];

/// ## Summary
/// Request half of an audit line, captured before the request is handed on.
///
/// [`AuditRecord::finish`] adds the response half and emits exactly one event
/// on the `audit` target.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub request_id: uuid::Uuid,
    pub method: String,
    pub url: String,
    pub account: String,
    pub remote: String,
    pub read_only: bool,
    pub headers: BTreeMap<String, String>,
}

impl AuditRecord {
    #[must_use]
    pub fn capture(req: &Request, account: &str, remote: &str, read_only: bool) -> Self {
        Self {
            request_id: uuid::Uuid::now_v7(),
            method: req.method().to_string(),
            url: req.uri().to_string(),
            account: account.to_string(),
            remote: remote.to_string(),
            read_only,
            headers: filtered_headers(req),
        }
    }

    pub fn finish(self, res: &Response) {
        let status = res.status_code.unwrap_or(StatusCode::OK);
        let size = body_size(&res.body);

        tracing::info!(
            target: "audit",
            request_id = %self.request_id,
            method = %self.method,
            url = %self.url,
            account = %self.account,
            remote = %self.remote,
            read_only = self.read_only,
            headers = ?self.headers,
            status = status.as_u16(),
            size = ?size,
            "request"
        );
    }
}

/// Request headers minus credentials and transport framing, repeated values joined.
#[must_use]
pub fn filtered_headers(req: &Request) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in req.headers() {
        if EXCLUDED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes());
        headers
            .entry(name.as_str().to_string())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    headers
}

/// Size of a buffered body; `None` for streaming bodies.
fn body_size(body: &ResBody) -> Option<usize> {
    match body {
        ResBody::None => Some(0),
        ResBody::Once(bytes) => Some(bytes.len()),
        ResBody::Chunks(chunks) => Some(chunks.iter().fold(0, |total, chunk| total + chunk.len())),
        _ => None,
    }
}
