//! Request-level concurrency limit.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::errors::FetchError;
use crate::fetch::{FetchRequest, FetchResult, Fetcher};

/// Wraps a fetcher so that at most `limit` requests run at once.
///
/// A pipeline may issue several requests concurrently, so bounding
/// pipelines alone does not bound the load on the remote sites. Excess
/// requests wait for a permit.
pub struct LimitedFetcher {
    inner: Arc<dyn Fetcher>,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl LimitedFetcher {
    /// Wraps `inner`. A limit of zero is raised to one.
    pub fn new(inner: Arc<dyn Fetcher>, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Maximum requests in flight.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl std::fmt::Debug for LimitedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedFetcher")
            .field("inner", &self.inner.name())
            .field("limit", &self.limit)
            .field("available", &self.permits.available_permits())
            .finish()
    }
}

#[async_trait]
impl Fetcher for LimitedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::InvalidRequest(format!("request limiter closed: {e}")))?;
        self.inner.fetch(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
