//! Embedded image discovery in HTML landing pages.
//!
//! Looks, in priority order, for `og:image`, `twitter:image`, then
//! `<link rel="image_src">`, and resolves the first usable value against the
//! page's final URL.

use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

/// (CSS selector, attribute carrying the reference), highest priority first.
const CANDIDATES: [(&str, &str); 3] = [
    (r#"meta[property="og:image"][content]"#, "content"),
    (r#"meta[name="twitter:image"][content]"#, "content"),
    (r#"link[rel~="image_src"][href]"#, "href"),
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no embedded image reference")]
    NotFound,

    #[error("selector {selector} failed to parse: {message}")]
    Selector {
        selector: &'static str,
        message: String,
    },
}

/// Find the page's representative image and make it absolute.
///
/// Blank values and values that cannot be joined onto `base` are skipped so a
/// broken `og:image` does not hide a usable `twitter:image`.
pub fn extract_image_reference(html: &str, base: &Url) -> Result<Url, ExtractError> {
    let document = Html::parse_document(html);

    for (css, attr) in CANDIDATES {
        let selector = Selector::parse(css).map_err(|e| ExtractError::Selector {
            selector: css,
            message: e.to_string(),
        })?;

        for element in document.select(&selector) {
            let Some(value) = element.value().attr(attr).map(str::trim) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match base.join(value) {
                Ok(url) => return Ok(url),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable image reference");
                }
            }
        }
    }

    Err(ExtractError::NotFound)
}
