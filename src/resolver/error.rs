//! Error taxonomy for the resolution pipeline.
//!
//! Every variant is terminal for the current request and maps to exactly one
//! caller-visible status code. Nothing here is retried.

use axum::http::StatusCode;
use thiserror::Error;

use crate::security::BlockReason;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Missing or malformed target URL.
    #[error("{0}")]
    InvalidInput(String),

    /// Target scheme is not http or https.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The host guard refused the destination. The reason is for logs and
    /// metrics only; the caller sees a fixed message.
    #[error("Forbidden host")]
    ForbiddenHost(BlockReason),

    /// Non-2xx primary response or a transport failure.
    #[error("Upstream fetch failed")]
    UpstreamFailure { status: Option<u16> },

    /// Primary response was neither an image nor HTML.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// No embedded image found, or the discovered one was not an image.
    #[error("{0}")]
    ExtractionFailure(String),

    /// Declared length exceeds the configured ceiling.
    #[error("Image exceeds maximum size of {limit} bytes")]
    PayloadTooLarge { declared: u64, limit: u64 },

    /// Anything unexpected. Detail is logged, never returned.
    #[error("Internal server error")]
    Internal(String),
}

impl ResolveError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ResolveError::InvalidInput(_)
            | ResolveError::UnsupportedScheme(_)
            | ResolveError::UnsupportedContentType(_)
            | ResolveError::ExtractionFailure(_) => StatusCode::BAD_REQUEST,
            ResolveError::ForbiddenHost(_) => StatusCode::FORBIDDEN,
            ResolveError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ResolveError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            ResolveError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::InvalidInput(_) => "invalid_input",
            ResolveError::UnsupportedScheme(_) => "unsupported_scheme",
            ResolveError::ForbiddenHost(_) => "forbidden_host",
            ResolveError::UpstreamFailure { .. } => "upstream_failure",
            ResolveError::UnsupportedContentType(_) => "unsupported_content_type",
            ResolveError::ExtractionFailure(_) => "extraction_failure",
            ResolveError::PayloadTooLarge { .. } => "payload_too_large",
            ResolveError::Internal(_) => "internal_error",
        }
    }

    pub(crate) fn no_image_found() -> Self {
        ResolveError::ExtractionFailure(
            "HTML response contained no discoverable image reference".to_string(),
        )
    }

    pub(crate) fn not_an_image() -> Self {
        ResolveError::ExtractionFailure(
            "Discovered image reference did not resolve to an image".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ResolveError::InvalidInput("x".into()), 400),
            (ResolveError::UnsupportedScheme("ftp".into()), 400),
            (ResolveError::ForbiddenHost(BlockReason::PrivateRange), 403),
            (ResolveError::UpstreamFailure { status: Some(404) }, 502),
            (ResolveError::UnsupportedContentType("application/pdf".into()), 400),
            (ResolveError::no_image_found(), 400),
            (ResolveError::PayloadTooLarge { declared: 6_000_000, limit: 5_242_880 }, 413),
            (ResolveError::Internal("boom".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status_code().as_u16(), code, "{}", err.kind());
        }
    }

    #[test]
    fn test_messages_hide_detail() {
        assert_eq!(ResolveError::ForbiddenHost(BlockReason::Loopback).to_string(), "Forbidden host");
        assert_eq!(ResolveError::Internal("selector exploded".into()).to_string(), "Internal server error");
    }
}
