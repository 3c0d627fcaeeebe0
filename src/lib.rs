//! Content-rewriting proxy library.
//!
//! # Architecture Overview
//!
//! ```text
//! GET /p/?u=<base64 target>
//!     │
//!     ▼
//! ┌─────────┐   ┌─────────┐   ┌─────────┐   ┌───────────────┐
//! │  http   │──▶│ address │──▶│  guard  │──▶│    fetch      │──▶ upstream
//! │ server  │   │  codec  │   │ (SSRF)  │   │  (reqwest)    │
//! └─────────┘   └─────────┘   └─────────┘   └───────┬───────┘
//!     ▲                                             │
//!     │         ┌──────────┐   ┌────────────────────▼────────┐
//!     └─────────│ assemble │◀──│ content_type → html/css     │
//!               │ (headers)│   │ rewriters (uri, dom, css)   │
//!               └──────────┘   └─────────────────────────────┘
//!
//! Any other path → assets (static files from the public directory)
//! ```
//!
//! Every reference inside a rewritten body points back at `/p/`, so a
//! browser that loads one proxied page keeps routing its subresource and
//! navigation traffic through the proxy.

pub mod assets;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
