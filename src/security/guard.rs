//! SSRF host classification.
//!
//! # Rules (evaluated in order, first match wins)
//! 1. `localhost`, `127.0.0.1`, `::1`
//! 2. `*.local`
//! 3. Dotted-quad IPv4 in `10.0.0.0/8`, `172.16.0.0/12`, `192.168.0.0/16`,
//!    `169.254.0.0/16`
//! 4. (extended only) `127.0.0.0/8`, `0.0.0.0/8`, `*.localhost`, `::`,
//!    `fe80::/10`, `fc00::/7`, IPv4-mapped IPv6 of any forbidden IPv4
//!
//! # Design Decisions
//! - Pure functions over the hostname string; no DNS, no state
//! - Address-level checks (`is_forbidden_ip`) are shared with the guarded
//!   DNS resolver so both layers agree on what "internal" means
//! - Rule 1-3 are the baseline; rule 4 is toggled by `extended_ranges`

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

use crate::config::SecurityConfig;

/// Why a host was refused. Only the label is ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Loopback,
    LocalDomain,
    PrivateRange,
    LinkLocal,
    Unspecified,
    UniqueLocal,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Loopback => "loopback",
            BlockReason::LocalDomain => "local_domain",
            BlockReason::PrivateRange => "private_range",
            BlockReason::LinkLocal => "link_local",
            BlockReason::Unspecified => "unspecified",
            BlockReason::UniqueLocal => "unique_local",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for a single target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClassification {
    Allowed,
    Forbidden(BlockReason),
}

impl HostClassification {
    pub fn is_allowed(&self) -> bool {
        matches!(self, HostClassification::Allowed)
    }
}

/// Rule set applied to every outbound target.
#[derive(Debug, Clone, Copy)]
pub struct HostGuard {
    extended: bool,
}

impl HostGuard {
    pub fn new(extended: bool) -> Self {
        Self { extended }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.extended_ranges)
    }

    /// Classify the host component of a parsed URL.
    pub fn classify_url(&self, url: &Url) -> HostClassification {
        match url.host() {
            Some(Host::Domain(domain)) => self.classify(domain),
            Some(Host::Ipv4(addr)) => self.classify(&addr.to_string()),
            Some(Host::Ipv6(addr)) => self.classify(&addr.to_string()),
            // No host means nothing to connect to; treat like loopback.
            None => HostClassification::Forbidden(BlockReason::Loopback),
        }
    }

    /// Classify a bare hostname (no brackets, no port).
    pub fn classify(&self, host: &str) -> HostClassification {
        let host = host.to_ascii_lowercase();
        let host = host.strip_suffix('.').unwrap_or(&host);

        if matches!(host, "localhost" | "127.0.0.1" | "::1") {
            return HostClassification::Forbidden(BlockReason::Loopback);
        }
        if host.ends_with(".local") {
            return HostClassification::Forbidden(BlockReason::LocalDomain);
        }
        if let Some(octets) = dotted_quad(host) {
            if let Some(reason) = baseline_v4(octets) {
                return HostClassification::Forbidden(reason);
            }
        }

        if self.extended {
            if host.ends_with(".localhost") {
                return HostClassification::Forbidden(BlockReason::Loopback);
            }
            if let Ok(ip) = host.parse::<IpAddr>() {
                if let Some(reason) = forbidden_ip(ip) {
                    return HostClassification::Forbidden(reason);
                }
            }
        }

        HostClassification::Allowed
    }
}

/// Address-level check used after DNS resolution.
pub fn is_forbidden_ip(ip: IpAddr) -> Option<BlockReason> {
    forbidden_ip(ip)
}

fn dotted_quad(host: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = host.split('.');
    for slot in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}

fn baseline_v4(octets: [u8; 4]) -> Option<BlockReason> {
    match octets {
        [10, ..] => Some(BlockReason::PrivateRange),
        [172, b, ..] if (16..=31).contains(&b) => Some(BlockReason::PrivateRange),
        [192, 168, ..] => Some(BlockReason::PrivateRange),
        [169, 254, ..] => Some(BlockReason::LinkLocal),
        _ => None,
    }
}

fn forbidden_ip(ip: IpAddr) -> Option<BlockReason> {
    match ip {
        IpAddr::V4(v4) => forbidden_v4(v4),
        IpAddr::V6(v6) => forbidden_v6(v6),
    }
}

fn forbidden_v4(v4: Ipv4Addr) -> Option<BlockReason> {
    let octets = v4.octets();
    if let Some(reason) = baseline_v4(octets) {
        return Some(reason);
    }
    match octets {
        [127, ..] => Some(BlockReason::Loopback),
        [0, ..] => Some(BlockReason::Unspecified),
        _ => None,
    }
}

fn forbidden_v6(v6: Ipv6Addr) -> Option<BlockReason> {
    if v6.is_loopback() {
        return Some(BlockReason::Loopback);
    }
    if v6.is_unspecified() {
        return Some(BlockReason::Unspecified);
    }
    if let Some(v4) = v6.to_ipv4_mapped() {
        return forbidden_v4(v4);
    }
    let first = v6.segments()[0];
    if first & 0xffc0 == 0xfe80 {
        return Some(BlockReason::LinkLocal);
    }
    if first & 0xfe00 == 0xfc00 {
        return Some(BlockReason::UniqueLocal);
    }
    None
}
