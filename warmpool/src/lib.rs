//! warmpool - per-key prefetch pools for slow, unreliable providers
//!
//! A [`PoolRegistry`](registry::PoolRegistry) keeps a small bounded queue of
//! pre-fetched items for each configured key. Pools refill themselves in the
//! background, drop native items once they go stale, and back off with a
//! cooldown when the provider keeps failing. Callers pull items without ever
//! waiting on a fetch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use warmpool::pool::{PoolKind, PoolPolicy};
//! use warmpool::provider::{provider_fn, FetchError, FetchRequest};
//! use warmpool::registry::{PoolRegistry, RegistrySettings};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = Arc::new(provider_fn(|request: FetchRequest| async move {
//!     Ok::<_, FetchError>(format!("creative for {}", request.unit_id))
//! }));
//!
//! let registry = Arc::new(PoolRegistry::new(provider, RegistrySettings::default()));
//! registry.configure([PoolPolicy::new("home_feed", PoolKind::Native).with_capacity(3)])?;
//! let _sweeper = registry.start();
//!
//! if let Some(item) = registry.consume("home_feed") {
//!     println!("showing {item}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod notify;
pub mod pool;
pub mod provider;
pub mod registry;
pub mod scheduler;

/// Version of the warmpool library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
