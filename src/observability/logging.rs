//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable via `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - The environment wins over the config file when both set a filter

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `default_level` comes from the config file and applies to this crate and
/// the HTTP middleware; `RUST_LOG` overrides it entirely when set.
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bypass={default_level},tower_http={default_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
