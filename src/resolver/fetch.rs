//! Outbound retrieval.
//!
//! # Responsibilities
//! - Issue GETs with the identifying headers
//! - Follow redirects, re-checking each hop against the host guard
//! - Refuse connections to forbidden addresses after DNS resolution
//! - Hand back status, declared type/length and an unread byte stream
//!
//! # Design Decisions
//! - One pooled `reqwest::Client` per process; nothing request-specific in it
//! - Environment proxies are ignored so guard decisions hold for the real peer
//! - Guard refusals raised inside reqwest are recovered by walking the error
//!   source chain for [`BlockedDestination`]

use std::error::Error as StdError;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use futures_util::{Stream, TryStreamExt};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

use crate::config::ProxyConfig;
use crate::security::guard::{is_forbidden_ip, BlockReason, HostClassification, HostGuard};

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Unread upstream body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// What a fetch hands to the next stage. Owned by exactly one consumer.
pub struct UpstreamResponse {
    pub status: StatusCode,
    /// URL after redirects; the base for resolving relative references.
    pub final_url: Url,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BodyStream,
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("final_url", &self.final_url.as_str())
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// A redirect hop or resolved address was refused by the guard.
    #[error("destination refused by host guard ({0})")]
    Forbidden(BlockReason),

    /// Connect, TLS, timeout, or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Raised from inside reqwest when a hop or an address is refused.
#[derive(Debug, Error)]
#[error("destination refused by host guard ({0})")]
pub struct BlockedDestination(pub BlockReason);

/// Seam between the pipeline and the network.
pub trait Fetch: Send + Sync + 'static {
    /// GET `url`, sending `accept` when given.
    fn fetch(
        &self,
        url: &Url,
        accept: Option<&'static str>,
    ) -> impl Future<Output = Result<UpstreamResponse, FetchError>> + Send;
}

/// Production fetcher backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        Self::with_lookup(config, Arc::new(SystemLookup))
    }

    /// Build with a custom name lookup. When `verify_resolved_addresses` is
    /// on, its answers still pass through the guard.
    pub fn with_lookup(
        config: &ProxyConfig,
        lookup: Arc<dyn Resolve>,
    ) -> Result<Self, reqwest::Error> {
        let guard = config
            .security
            .guard_redirects
            .then(|| HostGuard::from_config(&config.security));

        let mut builder = reqwest::Client::builder()
            .user_agent(config.fetch.user_agent.as_str())
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .timeout(Duration::from_secs(config.timeouts.upstream_secs))
            .redirect(redirect_policy(config.fetch.max_redirects, guard))
            .dns_resolver(Arc::new(GuardedResolver::new(
                lookup,
                config.security.verify_resolved_addresses,
            )))
            .no_proxy();

        // Port 0 keeps the port from the URL.
        for (host, ip) in &config.fetch.resolve_overrides {
            builder = builder.resolve(host, SocketAddr::new(*ip, 0));
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        url: &Url,
        accept: Option<&'static str>,
    ) -> Result<UpstreamResponse, FetchError> {
        let mut request = self.client.get(url.clone());
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let response = request.send().await.map_err(classify_error)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Ok(UpstreamResponse {
            status: response.status(),
            final_url: response.url().clone(),
            content_type,
            content_length: response.content_length(),
            body: Box::pin(response.bytes_stream().map_err(|e| Box::new(e) as BoxError)),
        })
    }
}

fn redirect_policy(max_redirects: usize, guard: Option<HostGuard>) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error(format!("stopped after {max_redirects} redirects"));
        }
        if let Some(guard) = &guard {
            if let HostClassification::Forbidden(reason) = guard.classify_url(attempt.url()) {
                return attempt.error(BlockedDestination(reason));
            }
        }
        attempt.follow()
    })
}

/// Name lookup through the system resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl Resolve for SystemLookup {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let addrs: Addrs = Box::new(tokio::net::lookup_host((name.as_str().to_owned(), 0)).await?);
            Ok(addrs)
        })
    }
}

/// DNS resolver that refuses names resolving to any forbidden address.
/// With `verify` off it passes `inner`'s answers through untouched.
struct GuardedResolver {
    inner: Arc<dyn Resolve>,
    verify: bool,
}

impl GuardedResolver {
    fn new(inner: Arc<dyn Resolve>, verify: bool) -> Self {
        Self { inner, verify }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let lookup = self.inner.resolve(name);
        let verify = self.verify;
        Box::pin(async move {
            let addrs: Vec<SocketAddr> = lookup.await?.collect();

            if !verify {
                return Ok(Box::new(addrs.into_iter()) as Addrs);
            }
            if let Some(reason) = addrs.iter().find_map(|addr| is_forbidden_ip(addr.ip())) {
                return Err(Box::new(BlockedDestination(reason)) as BoxError);
            }

            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}

fn classify_error(err: reqwest::Error) -> FetchError {
    let mut source: Option<&(dyn StdError + 'static)> = Some(&err);
    while let Some(cause) = source {
        if let Some(blocked) = cause.downcast_ref::<BlockedDestination>() {
            return FetchError::Forbidden(blocked.0);
        }
        source = cause.source();
    }

    if err.is_timeout() {
        FetchError::Transport("timed out".to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_overrides() {
        let mut config = ProxyConfig::default();
        config
            .fetch
            .resolve_overrides
            .insert("cdn.test".into(), "203.0.113.9".parse().unwrap());
        assert!(HttpFetcher::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_resolver_refuses_loopback_names() {
        let resolver = GuardedResolver::new(Arc::new(SystemLookup), true);
        let resolving = resolver.resolve("localhost".parse().unwrap());
        let err = match resolving.await {
            Ok(_) => panic!("localhost must not resolve through the guard"),
            Err(e) => e,
        };
        assert!(err.downcast_ref::<BlockedDestination>().is_some());
    }
}
