//! Network fetching with bounded retry.
//!
//! This module provides:
//! - The `Fetcher` protocol and its request/response types
//! - An HTTP implementation over one shared connection pool
//! - A wrapper bounding how many requests run at once
//! - Outcome classification and the `with_retry` combinator

mod http;
mod limit;
mod protocols;
mod retry;

pub use http::HttpFetcher;
pub use limit::LimitedFetcher;
pub use protocols::{classify, FetchOutcome, FetchRequest, FetchResult, Fetcher};
pub use retry::{with_retry, BackoffStrategy, JitterStrategy, RetryOutcome, RetryPolicy};
