//! Remote image resolution proxy library.
//!
//! Given a caller-supplied URL, safely retrieves an image (or the one an HTML
//! landing page advertises) and streams it back, refusing internal
//! destinations before any network access.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resolver;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resolver::{ResolveError, Resolver};
