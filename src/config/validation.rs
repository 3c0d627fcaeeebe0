//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the external URL is something rewritten references can route to
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    InvalidBindAddress(String),
    #[error("rewrite.external_url {0:?} is not a valid URL")]
    InvalidExternalUrl(String),
    #[error("rewrite.external_url {0:?} must use http or https")]
    ExternalUrlScheme(String),
    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("static_files.public_dir must not be empty")]
    EmptyPublicDir,
}

/// Validate a deserialized config, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    match Url::parse(&config.rewrite.external_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(_) => errors.push(ValidationError::ExternalUrlScheme(
            config.rewrite.external_url.clone(),
        )),
        Err(_) => errors.push(ValidationError::InvalidExternalUrl(
            config.rewrite.external_url.clone(),
        )),
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }
    if config.timeouts.dns_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("dns_secs"));
    }

    if config.static_files.public_dir.trim().is_empty() {
        errors.push(ValidationError::EmptyPublicDir);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
