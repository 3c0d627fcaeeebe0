//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → /p/  → proxy pipeline (decode, guard, fetch, rewrite)
//!     → else → static file handler
//!     → error.rs maps pipeline failures to status codes
//! ```

pub mod error;
pub mod server;

pub use error::RequestError;
pub use server::{HttpServer, ServerError};
