//! Response construction.
//!
//! # Responsibilities
//! - Relay a resolved image as a live stream with cache directives
//! - Map pipeline errors to status codes and the JSON error body
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Dropping the response body drops the upstream stream, closing it
//! - Error bodies never carry internal detail
//! - Relayed images carry a sandboxing CSP; SVG opened directly never runs script

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::resolver::{ResolveError, ResolvedImage};

/// `Content-Security-Policy` attached to every relayed image.
pub const IMAGE_CSP: &str = "default-src 'none'; sandbox";

/// JSON body for every failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let upstream_status = match &self {
            ResolveError::UpstreamFailure { status } => *status,
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            status: upstream_status,
        };
        (code, Json(body)).into_response()
    }
}

/// Stream a validated image to the caller.
pub fn image_response(image: ResolvedImage, cache_control: &HeaderValue) -> Response {
    let content_type = match HeaderValue::from_str(&image.content_type) {
        Ok(v) => v,
        Err(_) => {
            return ResolveError::Internal("upstream content type is not a valid header".into())
                .into_response()
        }
    };

    let mut response = Response::new(Body::from_stream(image.body));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, cache_control.clone());
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(IMAGE_CSP),
    );
    if let Some(len) = image.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ImageSource, LimitedBody};
    use crate::security::BlockReason;
    use axum::body::Bytes;
    use futures_util::stream;

    async fn json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_forbidden_body() {
        let response = ResolveError::ForbiddenHost(BlockReason::PrivateRange).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json(response).await, serde_json::json!({ "error": "Forbidden host" }));
    }

    #[tokio::test]
    async fn test_upstream_failure_carries_status() {
        let response = ResolveError::UpstreamFailure { status: Some(404) }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            json(response).await,
            serde_json::json!({ "error": "Upstream fetch failed", "status": 404 })
        );
    }

    #[tokio::test]
    async fn test_svg_is_sandboxed() {
        let svg = b"<svg xmlns='http://www.w3.org/2000/svg'><script>alert(1)</script></svg>";
        let chunks: Vec<Result<Bytes, crate::resolver::BoxError>> =
            vec![Ok(Bytes::from_static(svg))];
        let image = ResolvedImage {
            content_type: "image/svg+xml".to_string(),
            content_length: Some(svg.len() as u64),
            source: ImageSource::Direct,
            body: LimitedBody::new(Box::pin(stream::iter(chunks)), None),
        };

        let response = image_response(image, &HeaderValue::from_static("public, max-age=60"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
        assert_eq!(response.headers()[header::CONTENT_SECURITY_POLICY], IMAGE_CSP);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], svg.len().to_string().as_str());
    }

    #[tokio::test]
    async fn test_internal_is_generic() {
        let response = ResolveError::Internal("selector: unexpected token".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "Internal server error");
    }
}
