//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, rewrite for the origin)
//!     → hyper client → documentation origin
//!     → response.rs (strip hop-by-hop headers)
//!     → transform::ResponseAssembler (rewrite or pass through)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
