//! Fetch provider abstraction.
//!
//! The registry never talks to a remote service directly. Each refill calls
//! [`FetchProvider::fetch`] once and awaits the returned future on the tokio
//! runtime. The provider may be called concurrently for different keys but
//! never twice at once for the same key.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::pool::{PoolKey, PoolKind, PoolPolicy};

/// Future returned by a provider.
pub type FetchFuture<T> = BoxFuture<'static, Result<T, FetchError>>;

/// What a provider is asked to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub key: PoolKey,
    pub kind: PoolKind,
    pub unit_id: String,
}

impl FetchRequest {
    pub fn for_policy(policy: &PoolPolicy) -> Self {
        Self {
            key: policy.key().clone(),
            kind: policy.kind(),
            unit_id: policy.unit_id().to_string(),
        }
    }
}

/// A failed fetch. Always transient from the pool's point of view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The provider reported an error.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider completed without an item.
    #[error("Provider returned no item")]
    Empty,

    /// The fetch did not complete within the configured timeout.
    #[error("Fetch timed out after {0:?}")]
    TimedOut(Duration),
}

/// Source of pool items.
pub trait FetchProvider<T>: Send + Sync {
    /// Start fetching one item for `request`.
    fn fetch(&self, request: FetchRequest) -> FetchFuture<T>;
}

/// Provider backed by a closure. Built with [`provider_fn`].
pub struct FnProvider<F> {
    f: F,
}

/// Wrap an async closure as a [`FetchProvider`].
///
/// # Example
///
/// ```
/// use warmpool::provider::{provider_fn, FetchError, FetchProvider, FetchRequest};
///
/// let provider = provider_fn(|request: FetchRequest| async move {
///     Ok::<_, FetchError>(format!("item for {}", request.unit_id))
/// });
/// let _future = provider.fetch(FetchRequest {
///     key: "feed".into(),
///     kind: warmpool::pool::PoolKind::Native,
///     unit_id: "unit-1".into(),
/// });
/// ```
pub fn provider_fn<F>(f: F) -> FnProvider<F> {
    FnProvider { f }
}

impl<T, F, Fut> FetchProvider<T> for FnProvider<F>
where
    F: Fn(FetchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    fn fetch(&self, request: FetchRequest) -> FetchFuture<T> {
        Box::pin((self.f)(request))
    }
}
