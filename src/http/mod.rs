//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     TCP connection
//!     → server.rs (Axum setup, shared middleware, /health, /metrics)
//!     → request.rs (request ID, request span, request metrics)
//!     → spec_api.rs | roll_api.rs | gateway_api.rs (one per service)
//!     → response.rs (domain error → status + JSON body)
//!
//! Outbound:
//!     client.rs (traceparent injection, bounded timeout) → next hop
//! ```

pub mod client;
pub mod gateway_api;
pub mod request;
pub mod response;
pub mod roll_api;
pub mod server;
pub mod spec_api;

pub use client::{UpstreamClient, UpstreamError};
pub use request::X_REQUEST_ID;
pub use response::{ApiError, ErrorBody, ErrorKind};
pub use server::{HealthStatus, HttpServer};
