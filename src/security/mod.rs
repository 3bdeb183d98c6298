//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Target URL:
//!     → guard.rs (classify host: loopback / private / link-local / .local)
//!     → outbound fetch (redirect hops and resolved addresses re-checked)
//!
//! Outgoing response:
//!     → headers.rs (nosniff)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject before any network access
//! - Guard is a stateless predicate, fixed at build time
//! - No trust in client input

pub mod guard;
pub mod headers;

pub use guard::{BlockReason, HostClassification, HostGuard};
