//! Edge transformer that injects Read the Docs addons into documentation pages.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod transform;

pub use config::schema::EdgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transform::{ResponseAssembler, TransformMode};
