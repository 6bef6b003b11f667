//! Request identification and origin request preparation.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4) for requests that lack one
//! - Rewrite the client request into a request for the origin
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The request body is streamed to the origin, never buffered

use axum::body::Body;
use axum::http::uri::InvalidUri;
use axum::http::{header, HeaderValue, Request, Uri, Version};
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::config::OriginConfig;
use crate::http::response::strip_hop_by_hop;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `x-request-id` values with UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Access to the request ID header.
pub trait RequestIdExt {
    /// The request ID, or `"unknown"` when none was assigned.
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Point a client request at the origin, keeping method, headers and body.
pub fn build_origin_request(
    origin: &OriginConfig,
    request: Request<Body>,
) -> Result<Request<Body>, InvalidUri> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri: Uri = format!("{}{}", origin.url.trim_end_matches('/'), path_and_query).parse()?;

    strip_hop_by_hop(&mut parts.headers);
    if !origin.preserve_host {
        parts.headers.remove(header::HOST);
    }
    parts.uri = uri;
    parts.version = Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}
