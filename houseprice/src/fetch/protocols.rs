//! Protocol types for fetching.
//!
//! The `Fetcher` trait is the seam between pipelines and the network, so
//! tests can swap in a scripted implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use super::retry::RetryPolicy;
use crate::errors::FetchError;

/// A single GET request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Target URL without query string.
    pub url: String,
    /// Query parameters, encoded by the fetcher.
    pub query: Vec<(String, String)>,
    /// Extra per-request headers.
    pub headers: HashMap<String, String>,
}

impl FetchRequest {
    /// Creates a GET request for a URL.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GET {}", self.url)?;
        // Keys only: values may carry API keys.
        if !self.query.is_empty() {
            let keys: Vec<&str> = self.query.iter().map(|(k, _)| k.as_str()).collect();
            write!(f, " [{}]", keys.join(","))?;
        }
        Ok(())
    }
}

/// Result of a completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body as text.
    pub text: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// Time taken to fetch in milliseconds.
    pub duration_ms: f64,
}

impl FetchResult {
    /// Creates a 200 result with a body, mostly useful in tests.
    #[must_use]
    pub fn ok(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_status(url, 200, text)
    }

    /// Creates a result with an explicit status.
    #[must_use]
    pub fn with_status(url: impl Into<String>, status_code: u16, text: impl Into<String>) -> Self {
        Self {
            status_code,
            text: text.into(),
            final_url: url.into(),
            duration_ms: 0.0,
        }
    }

    /// Whether the fetch was successful (2xx status).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Tagged result of one network attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    /// The attempt produced a usable value.
    Success(T),
    /// The attempt failed in a way a retry may fix.
    TransientFailure(String),
    /// The attempt failed in a way no retry will fix.
    FatalFailure(String),
}

impl<T> FetchOutcome<T> {
    /// Maps the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> FetchOutcome<U> {
        match self {
            Self::Success(value) => FetchOutcome::Success(f(value)),
            Self::TransientFailure(reason) => FetchOutcome::TransientFailure(reason),
            Self::FatalFailure(reason) => FetchOutcome::FatalFailure(reason),
        }
    }

    /// Whether the attempt succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Splits off the success value, re-typing a failure so a multi-step
    /// attempt can return it early.
    pub fn into_success<U>(self) -> Result<T, FetchOutcome<U>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::TransientFailure(reason) => Err(FetchOutcome::TransientFailure(reason)),
            Self::FatalFailure(reason) => Err(FetchOutcome::FatalFailure(reason)),
        }
    }
}

/// Classifies a raw fetch result.
///
/// Transport errors and non-2xx statuses are transient unless the status
/// is listed in `policy.fatal_status_codes`.
pub fn classify(
    result: Result<FetchResult, FetchError>,
    policy: &RetryPolicy,
) -> FetchOutcome<FetchResult> {
    match result {
        Ok(response) if response.is_success() => FetchOutcome::Success(response),
        Ok(response) => {
            let reason = format!("HTTP {} for {}", response.status_code, response.final_url);
            if policy.is_fatal_status(response.status_code) {
                FetchOutcome::FatalFailure(reason)
            } else {
                FetchOutcome::TransientFailure(reason)
            }
        }
        Err(err) => match err.status() {
            Some(status) if policy.is_fatal_status(status) => {
                FetchOutcome::FatalFailure(err.to_string())
            }
            Some(_) | None => FetchOutcome::TransientFailure(err.to_string()),
        },
    }
}

/// Protocol for HTTP fetching.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs one request. Non-2xx responses are returned as `Ok`.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, FetchError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "fetcher"
    }
}
