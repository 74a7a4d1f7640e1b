//! Bulk quote retrieval with a shared TTL cache and request coalescing.
//!
//! The pieces stack leaf-first:
//! - [`store::ExpiringStore`] keeps decoded records with their fetch instant.
//! - [`coalesce::Coalescer`] merges concurrent, overlapping requests into one
//!   producer call per batch window and serializes producer calls.
//! - [`quotes::QuoteSource`] is the producer: it chunks a symbol set into
//!   parallel upstream requests and reconciles the answers.
//!
//! [`QuoteClient`] wires them together behind a single entry point.

pub mod client;
pub mod clock;
pub mod coalesce;
pub mod error;
pub mod metrics;
pub mod modules;
pub mod net;
pub mod quotes;
pub mod security;
pub mod store;
pub mod symbol;

pub use client::{ClientConfig, QuoteClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coalesce::{Coalescer, Producer};
pub use error::FetchError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use modules::{ModuleError, ModuleResult, ModuleSet, ModuleSource};
pub use quotes::QuoteSource;
pub use security::Security;
pub use store::{CacheEntry, ExpiringStore};
pub use symbol::Symbol;

pub use tokio_util::sync::CancellationToken;
