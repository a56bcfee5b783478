//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, one hub per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (tag each request for log and Sentry correlation)

pub mod auth;
pub mod request_id;

pub use auth::{AuthRejection, RequireSession};
pub use request_id::request_id_middleware;
