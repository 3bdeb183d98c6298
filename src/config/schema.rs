//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Root configuration for the image proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Outbound retrieval settings.
    pub fetch: FetchConfig,

    /// Cache directive sent with relayed images.
    pub cache: CacheConfig,

    /// SSRF guard hardening switches.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
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

/// Timeout configuration for inbound and outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound request timeout (until response headers) in seconds.
    pub request_secs: u64,

    /// Outbound connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Outbound whole-exchange timeout (including body) in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            connect_secs: 5,
            upstream_secs: 20,
        }
    }
}

/// Outbound retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Identifying `User-Agent` sent on both fetches.
    pub user_agent: String,

    /// Maximum redirect hops followed per fetch.
    pub max_redirects: usize,

    /// Ceiling on relayed image size in bytes.
    pub max_image_bytes: u64,

    /// Abort the relay once more than `max_image_bytes` have been streamed,
    /// even when the upstream declared no (or a smaller) length.
    pub enforce_stream_limit: bool,

    /// Maximum bytes of an HTML landing page scanned for metadata.
    pub max_html_bytes: usize,

    /// Static host -> address pins, bypassing DNS (operator-trusted).
    pub resolve_overrides: BTreeMap<String, IpAddr>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
            max_redirects: 10,
            max_image_bytes: 5 * 1024 * 1024, // 5 MiB
            enforce_stream_limit: true,
            max_html_bytes: 2 * 1024 * 1024,
            resolve_overrides: BTreeMap::new(),
        }
    }
}

/// Cache-Control parameters for successful responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window in seconds.
    pub max_age_secs: u64,

    /// Stale-while-revalidate allowance in seconds.
    pub stale_while_revalidate_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 3600,
            stale_while_revalidate_secs: 86400,
        }
    }
}

impl CacheConfig {
    /// Render as a `Cache-Control` header value.
    pub fn header_value(&self) -> String {
        format!(
            "public, max-age={}, stale-while-revalidate={}",
            self.max_age_secs, self.stale_while_revalidate_secs
        )
    }
}

/// SSRF guard hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Forbid the wider loopback/unspecified/IPv6 private ranges too.
    pub extended_ranges: bool,

    /// Re-run the guard on every redirect hop.
    pub guard_redirects: bool,

    /// Refuse connections whose resolved addresses are forbidden.
    pub verify_resolved_addresses: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            extended_ranges: true,
            guard_redirects: true,
            verify_resolved_addresses: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log line format.
    pub log_format: LogFormat,

    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address for the Prometheus endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_header_default() {
        assert_eq!(
            CacheConfig::default().header_value(),
            "public, max-age=3600, stale-while-revalidate=86400"
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [fetch]
            max_image_bytes = 1024

            [fetch.resolve_overrides]
            "cdn.test" = "203.0.113.7"

            [observability]
            log_format = "pretty"
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.max_image_bytes, 1024);
        assert_eq!(config.fetch.max_redirects, 10);
        assert_eq!(
            config.fetch.resolve_overrides.get("cdn.test"),
            Some(&"203.0.113.7".parse::<IpAddr>().unwrap())
        );
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.security.verify_resolved_addresses);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
