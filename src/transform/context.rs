//! Per-response request context derived from origin headers.

use axum::http::{header, HeaderMap, StatusCode};

pub const X_RTD_FORCE_ADDONS: &str = "x-rtd-force-addons";
pub const X_RTD_HOSTING_INTEGRATIONS: &str = "x-rtd-hosting-integrations";
pub const X_RTD_PROJECT: &str = "x-rtd-project";
pub const X_RTD_VERSION: &str = "x-rtd-version";
pub const X_RTD_RESOLVER_FILENAME: &str = "x-rtd-resolver-filename";
pub const X_RTD_LOAD_WHEN_EMBEDDED: &str = "x-rtd-load-addons-when-embedded";
pub const X_RTD_THROW_ERROR: &str = "x-rtd-throw-error";
pub const X_RTD_DEBUG_THROW_ERROR: &str = "x-rtd-debug-throw-error";

/// Everything the decision policy and rewriter need to know about a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Request path, used to recognise the searchtools asset.
    pub path: String,
    pub content_type: String,
    /// Empty when absent.
    pub content_encoding: String,
    pub force_addons: bool,
    pub hosting_integrations: bool,
    pub project_slug: String,
    pub version_slug: String,
    pub resolver_filename: String,
    pub load_when_embedded: bool,
    pub http_status: u16,
    pub debug_throw_error: bool,
}

impl RequestContext {
    /// Read the routing headers of an origin response.
    ///
    /// Fault injection headers are ignored unless `allow_fault_injection` is set.
    pub fn from_response(
        path: &str,
        status: StatusCode,
        headers: &HeaderMap,
        allow_fault_injection: bool,
    ) -> Self {
        let throw_error = allow_fault_injection
            && (header_present(headers, X_RTD_THROW_ERROR)
                || header_present(headers, X_RTD_DEBUG_THROW_ERROR));

        Self {
            path: path.to_string(),
            content_type: header_str(headers, header::CONTENT_TYPE.as_str()),
            content_encoding: header_str(headers, header::CONTENT_ENCODING.as_str()),
            force_addons: header_flag(headers, X_RTD_FORCE_ADDONS),
            hosting_integrations: header_flag(headers, X_RTD_HOSTING_INTEGRATIONS),
            project_slug: header_str(headers, X_RTD_PROJECT),
            version_slug: header_str(headers, X_RTD_VERSION),
            resolver_filename: header_str(headers, X_RTD_RESOLVER_FILENAME),
            load_when_embedded: header_flag(headers, X_RTD_LOAD_WHEN_EMBEDDED),
            http_status: status.as_u16(),
            debug_throw_error: throw_error,
        }
    }

    pub fn is_html(&self) -> bool {
        self.content_type.contains("text/html")
    }

    pub fn is_javascript(&self) -> bool {
        self.content_type.contains("text/javascript")
            || self.content_type.contains("application/javascript")
    }

    /// True when the body is compressed and cannot be rewritten as-is.
    pub fn is_encoded(&self) -> bool {
        !self.content_encoding.is_empty() && !self.content_encoding.eq_ignore_ascii_case("identity")
    }
}

/// Header value as text. Non-ASCII bytes are decoded as UTF-8, lossily.
fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn header_flag(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn header_present(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}
