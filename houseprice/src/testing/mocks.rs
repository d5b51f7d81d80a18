//! Scripted fetcher for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::FetchError;
use crate::fetch::{FetchRequest, FetchResult, Fetcher};

/// What the scripted fetcher answers to one request.
#[derive(Debug, Clone)]
pub struct MockReply {
    /// Simulated latency.
    pub delay: Duration,
    /// The result handed back.
    pub result: Result<FetchResult, FetchError>,
}

impl MockReply {
    /// A 200 response.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    /// A response with the given status.
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(FetchResult::with_status("mock://", status, body)),
        }
    }

    /// A transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(FetchError::Transport(message.into())),
        }
    }

    /// Delays the reply.
    #[must_use]
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = Box<dyn Fn(&FetchRequest) -> MockReply + Send + Sync>;

/// A fetcher that answers from a closure and records every request.
///
/// It also tracks how many requests are in flight at once.
pub struct ScriptedFetcher {
    responder: Responder,
    calls: Mutex<Vec<FetchRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    /// Creates a fetcher answering with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&FetchRequest) -> MockReply + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Total requests received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Requests matching a predicate.
    pub fn count_matching<P>(&self, predicate: P) -> usize
    where
        P: Fn(&FetchRequest) -> bool,
    {
        self.calls.lock().iter().filter(|r| predicate(r)).count()
    }

    /// Copies of every recorded request.
    #[must_use]
    pub fn recorded(&self) -> Vec<FetchRequest> {
        self.calls.lock().clone()
    }

    /// Highest number of concurrently running requests seen.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ScriptedFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedFetcher")
            .field("call_count", &self.call_count())
            .field("peak_in_flight", &self.peak_in_flight())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        self.calls.lock().push(request.clone());
        let reply = (self.responder)(request);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        reply.result.map(|mut result| {
            result.final_url = request.url.clone();
            result.duration_ms = reply.delay.as_secs_f64() * 1000.0;
            result
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
