//! Response security headers.
//!
//! Relayed bodies come from arbitrary third parties. Browsers must use the
//! declared image type rather than sniffing the bytes into something active.

use axum::http::{header, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

/// Layer adding `X-Content-Type-Options: nosniff` unless a handler set it.
pub fn nosniff_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    )
}
