//! Remote image resolution pipeline.
//!
//! # Data Flow
//! ```text
//! ?url=<target>
//!     → target.rs   (parse, http/https only)             InvalidInput / UnsupportedScheme
//!     → guard       (classify host, no network)          ForbiddenHost
//!     → fetch.rs    (primary GET, redirects)             UpstreamFailure
//!     → content type?
//!         image/*   → size check                         PayloadTooLarge
//!         text/html → extract.rs (og / twitter / link)   ExtractionFailure
//!                   → guard + secondary GET (image/*)    ExtractionFailure
//!                   → size check                         PayloadTooLarge
//!         other     →                                    UnsupportedContentType
//!     → limit.rs    (streamed body, byte cutoff)
//! ```
//!
//! # Design Decisions
//! - Each stage is a `Result`-returning step; the first error is terminal
//! - Image bodies are never buffered; only HTML is read into memory, capped
//! - Nothing survives the call: no cache, no shared mutable state

pub mod error;
pub mod extract;
pub mod fetch;
pub mod limit;
pub mod target;

use futures_util::StreamExt;
use url::Url;

use crate::config::FetchConfig;
use crate::security::{HostClassification, HostGuard};

pub use error::ResolveError;
pub use fetch::{
    BodyStream, BoxError, Fetch, FetchError, HttpFetcher, SystemLookup, UpstreamResponse,
};
pub use limit::LimitedBody;
pub use target::TargetReference;

/// `Accept` sent on the primary fetch: images first, then HTML.
pub const PRIMARY_ACCEPT: &str =
    "image/avif,image/webp,image/apng,image/*,text/html;q=0.9,*/*;q=0.8";

/// `Accept` sent when following an embedded reference.
pub const SECONDARY_ACCEPT: &str = "image/*";

/// Where the relayed image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// The target itself was an image.
    Direct,
    /// Discovered in the target's HTML metadata.
    Embedded,
}

impl ImageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSource::Direct => "direct",
            ImageSource::Embedded => "embedded",
        }
    }
}

/// A validated image ready to stream to the caller.
pub struct ResolvedImage {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub source: ImageSource,
    pub body: LimitedBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentKind {
    Image,
    Html,
    Other(String),
}

/// Lower-cased media type without parameters.
fn classify_content_type(header: Option<&str>) -> ContentKind {
    let essence = header
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence.starts_with("image/") {
        ContentKind::Image
    } else if essence.starts_with("text/html") {
        ContentKind::Html
    } else if essence.is_empty() {
        ContentKind::Other("(none)".to_string())
    } else {
        ContentKind::Other(essence)
    }
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_image_bytes: u64,
    enforce_stream_limit: bool,
    max_html_bytes: usize,
}

/// Runs the pipeline for one target at a time; holds only immutable settings
/// and the fetcher, so one instance serves all concurrent calls.
pub struct Resolver<F> {
    fetcher: F,
    guard: HostGuard,
    limits: Limits,
}

impl<F: Fetch> Resolver<F> {
    pub fn new(fetcher: F, guard: HostGuard, fetch: &FetchConfig) -> Self {
        Self {
            fetcher,
            guard,
            limits: Limits {
                max_image_bytes: fetch.max_image_bytes,
                enforce_stream_limit: fetch.enforce_stream_limit,
                max_html_bytes: fetch.max_html_bytes,
            },
        }
    }

    /// Resolve the raw `url` query value to a streamable image.
    pub async fn resolve(&self, raw: Option<&str>) -> Result<ResolvedImage, ResolveError> {
        let target = TargetReference::parse(raw)?;
        self.check_host(target.as_url())?;

        let primary = self
            .fetcher
            .fetch(target.as_url(), Some(PRIMARY_ACCEPT))
            .await
            .map_err(fetch_failure)?;

        if !primary.status.is_success() {
            tracing::debug!(status = %primary.status, "Primary fetch returned non-success status");
            return Err(ResolveError::UpstreamFailure {
                status: Some(primary.status.as_u16()),
            });
        }

        match classify_content_type(primary.content_type.as_deref()) {
            ContentKind::Image => self.admit(primary, ImageSource::Direct),
            ContentKind::Html => {
                let image = self.follow_embedded(primary).await?;
                self.admit(image, ImageSource::Embedded)
            }
            ContentKind::Other(content_type) => {
                Err(ResolveError::UnsupportedContentType(content_type))
            }
        }
    }

    fn check_host(&self, url: &Url) -> Result<(), ResolveError> {
        match self.guard.classify_url(url) {
            HostClassification::Allowed => Ok(()),
            HostClassification::Forbidden(reason) => Err(ResolveError::ForbiddenHost(reason)),
        }
    }

    /// HTML branch: scan the page, then fetch and validate what it names.
    async fn follow_embedded(&self, page: UpstreamResponse) -> Result<UpstreamResponse, ResolveError> {
        let base = page.final_url;
        let html = read_capped(page.body, self.limits.max_html_bytes)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed reading HTML body");
                ResolveError::UpstreamFailure { status: None }
            })?;

        let reference = extract::extract_image_reference(&html, &base).map_err(|e| match e {
            extract::ExtractError::NotFound => ResolveError::no_image_found(),
            other => ResolveError::Internal(other.to_string()),
        })?;

        if !matches!(reference.scheme(), "http" | "https") {
            return Err(ResolveError::not_an_image());
        }
        self.check_host(&reference)?;

        tracing::debug!(reference = %reference, "Following embedded image reference");

        let image = self
            .fetcher
            .fetch(&reference, Some(SECONDARY_ACCEPT))
            .await
            .map_err(fetch_failure)?;

        let is_image = classify_content_type(image.content_type.as_deref()) == ContentKind::Image;
        if !image.status.is_success() || !is_image {
            tracing::debug!(
                status = %image.status,
                content_type = ?image.content_type,
                "Embedded reference is not an image"
            );
            return Err(ResolveError::not_an_image());
        }

        Ok(image)
    }

    /// Declared-size check, then wrap the body for streaming.
    fn admit(&self, upstream: UpstreamResponse, source: ImageSource) -> Result<ResolvedImage, ResolveError> {
        let limit = self.limits.max_image_bytes;
        if let Some(declared) = upstream.content_length {
            if declared > limit {
                return Err(ResolveError::PayloadTooLarge { declared, limit });
            }
        }

        let content_type = upstream
            .content_type
            .ok_or_else(|| ResolveError::Internal("image response without content type".to_string()))?;

        Ok(ResolvedImage {
            content_type,
            content_length: upstream.content_length,
            source,
            body: LimitedBody::new(
                upstream.body,
                self.limits.enforce_stream_limit.then_some(limit),
            ),
        })
    }
}

fn fetch_failure(err: FetchError) -> ResolveError {
    match err {
        FetchError::Forbidden(reason) => ResolveError::ForbiddenHost(reason),
        FetchError::Transport(message) => {
            tracing::warn!(error = %message, "Upstream request failed");
            ResolveError::UpstreamFailure { status: None }
        }
    }
}

/// Read at most `cap` bytes and decode lossily. Dropping the rest of the
/// stream closes the upstream connection.
async fn read_capped(mut body: BodyStream, cap: usize) -> Result<String, BoxError> {
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let room = cap - buf.len();
        if chunk.len() >= room {
            buf.extend_from_slice(&chunk[..room]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
