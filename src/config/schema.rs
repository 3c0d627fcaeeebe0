//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Rewriting behaviour: external URL and per-kind toggles.
    pub rewrite: RewriteConfig,

    /// Static file serving.
    pub static_files: StaticFileConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security settings for outbound targets.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
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

/// Rewriting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// URL clients reach this proxy at. Rewritten references route here,
    /// so it must match the deployed scheme/host/port.
    pub external_url: String,

    /// Rewrite HTML bodies (links, images, inline styles).
    pub modify_html: bool,

    /// Rewrite `url()` references inside CSS bodies.
    pub modify_css: bool,

    /// Drop upstream `Content-Security-Policy` headers.
    pub strip_cors: bool,

    /// Drop upstream `X-Frame-Options` headers.
    pub strip_frame_options: bool,

    /// Drop `integrity` attributes from rewritten documents.
    pub strip_integrity_attributes: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            external_url: "http://localhost:8080".to_string(),
            modify_html: true,
            modify_css: true,
            strip_cors: true,
            strip_frame_options: true,
            strip_integrity_attributes: true,
        }
    }
}

/// Static file serving configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFileConfig {
    /// Directory served for paths outside the proxy endpoint.
    pub public_dir: String,

    /// Cache index and error pages in memory at startup.
    pub cache_static: bool,
}

impl Default for StaticFileConfig {
    fn default() -> Self {
        Self {
            public_dir: "public".to_string(),
            cache_static: true,
        }
    }
}

/// Timeout configuration for outbound fetches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// DNS resolution timeout in seconds.
    pub dns_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 30,
            dns_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Security configuration for outbound targets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Skip outbound target vetting (port policy and private-range checks).
    /// Only meant for local development against local upstreams.
    pub allow_private_targets: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_private_targets: false,
        }
    }
}
