//! Request-level error taxonomy and status mapping.
//!
//! # Design Decisions
//! - One enum per failure class, wrapping the pipeline stage errors
//! - Client mistakes and upstream failures map to 400
//! - Policy rejections map to 403
//! - Only a failed re-serialization is a 500; nothing else is our fault

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::proxy::address::AddressError;
use crate::proxy::assemble::AssembleError;
use crate::proxy::fetch::FetchError;
use crate::proxy::guard::GuardError;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("url not provided")]
    MissingTarget,
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Rejected(#[from] GuardError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::MissingTarget
            | RequestError::Address(_)
            | RequestError::Fetch(_) => StatusCode::BAD_REQUEST,
            RequestError::Rejected(_) => StatusCode::FORBIDDEN,
            RequestError::Assemble(AssembleError::Serialize(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RequestError::Assemble(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = %status, error = %self, "Request rejected");
        (status, self.to_string()).into_response()
    }
}
