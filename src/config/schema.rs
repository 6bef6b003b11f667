//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to its defaults so an empty file is valid.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge transformer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin documentation server every request is forwarded to.
    pub origin: OriginConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Response transform settings.
    pub transform: TransformConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Origin server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL of the origin (plain http, e.g. "http://127.0.0.1:8000").
    pub url: String,

    /// Forward the client's Host header instead of the origin's authority.
    pub preserve_host: bool,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
            preserve_host: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout to the origin in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Response transform configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TransformConfig {
    /// Master switch; when off every response passes through.
    pub enabled: bool,

    /// Largest body buffered for a transform. Bigger bodies pass through.
    pub max_body_bytes: usize,

    /// Honour the `x-rtd-throw-error` debug headers. Never enable in production.
    pub allow_fault_injection: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            allow_fault_injection: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
