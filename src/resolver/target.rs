//! Target URL validation.
//!
//! Parses the caller-supplied string into a [`TargetReference`]. No network
//! access happens here.

use url::Url;

use super::error::ResolveError;

/// A validated absolute http(s) URL supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReference {
    url: Url,
}

impl TargetReference {
    /// Parse and validate the raw query value.
    pub fn parse(raw: Option<&str>) -> Result<Self, ResolveError> {
        let raw = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ResolveError::InvalidInput("Missing url parameter".to_string()))?;

        let url = Url::parse(raw)
            .map_err(|e| ResolveError::InvalidInput(format!("Invalid URL: {e}")))?;

        // `Url` lower-cases the scheme, so this comparison is case-insensitive.
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ResolveError::UnsupportedScheme(other.to_string())),
        }

        if url.host().is_none() {
            return Err(ResolveError::InvalidInput("Invalid URL: missing host".to_string()));
        }

        Ok(Self { url })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Lower-cased hostname; IPv6 literals keep their brackets.
    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }
}
