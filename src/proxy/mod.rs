//! The request transformation pipeline.
//!
//! # Data Flow
//! ```text
//! GET /p/?u=<token>
//!     → address.rs      (decode token → absolute target URL)
//!     → guard.rs        (port policy, private-range SSRF checks)
//!     → fetch.rs        (outbound GET, User-Agent forwarded)
//!     → content_type.rs (header parse, body sniffing, charset backfill)
//!     → html.rs / css.rs / passthrough
//!     → assemble.rs     (header policy, final body)
//! ```
//!
//! Everything here is request-scoped: no caches, no shared mutable state,
//! configuration read-only for the process lifetime.

pub mod address;
pub mod assemble;
pub mod content_type;
pub mod css;
pub mod dom;
pub mod fetch;
pub mod guard;
pub mod html;
pub mod uri;

pub use content_type::ContentDescriptor;
pub use fetch::{FetchResult, UpstreamFetcher};
pub use uri::RewriteContext;
