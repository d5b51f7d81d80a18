//! Bounded-concurrency task runner.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::fetch::{Fetcher, LimitedFetcher};

/// Outcome of one pipeline, re-associated with its input.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput<I, O> {
    /// Position of the input in the submitted list.
    pub index: usize,
    /// The input itself.
    pub input: I,
    /// The pipeline's output, or `None` if the task panicked.
    pub output: Option<O>,
}

/// Runs one pipeline per input with at most `concurrency` in flight.
///
/// The runner owns the shared fetcher (and with it the connection pool)
/// for the whole run and hands a clone of the handle to every pipeline.
/// The handle is wrapped in a [`LimitedFetcher`], so the same bound also
/// applies to individual requests across all pipelines.
pub struct TaskRunner {
    run_id: Uuid,
    fetcher: Arc<dyn Fetcher>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl TaskRunner {
    /// Creates a runner. A concurrency of zero is raised to one.
    pub fn new(fetcher: Arc<dyn Fetcher>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            run_id: Uuid::new_v4(),
            fetcher: Arc::new(LimitedFetcher::new(fetcher, concurrency)),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    /// Identifier of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// A handle to the shared, request-limited fetcher.
    #[must_use]
    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        Arc::clone(&self.fetcher)
    }

    /// Runs `pipeline` for every input and waits for all of them.
    ///
    /// Results come back in input order whatever order the tasks finish
    /// in. A panicking pipeline is logged and reported as `output: None`;
    /// it does not disturb the others.
    pub async fn run_all<I, O, F, Fut>(&self, inputs: Vec<I>, pipeline: F) -> Vec<TaskOutput<I, O>>
    where
        I: Clone + Send + 'static,
        O: Send + 'static,
        F: Fn(Arc<dyn Fetcher>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        let total = inputs.len();
        info!(run_id = %self.run_id, total, concurrency = self.concurrency, "Starting pipelines");

        let pipeline = Arc::new(pipeline);
        let mut pending = FuturesUnordered::new();

        for (index, input) in inputs.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&self.semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let pipeline = Arc::clone(&pipeline);
            let span = info_span!("item", run_id = %self.run_id, index);

            let handle = tokio::spawn(
                async move {
                    // The semaphore is never closed, so acquire only fails if it were.
                    let _permit = semaphore.acquire_owned().await.ok();
                    (*pipeline)(fetcher, input).await
                }
                .instrument(span),
            );
            pending.push(async move { (index, handle.await) });
        }

        let mut slots: Vec<Option<O>> = std::iter::repeat_with(|| None).take(total).collect();
        let mut failed = 0usize;

        while let Some((index, joined)) = pending.next().await {
            match joined {
                Ok(output) => slots[index] = Some(output),
                Err(join_error) => {
                    failed += 1;
                    error!(run_id = %self.run_id, index, error = %join_error, "Pipeline task failed");
                }
            }
        }

        info!(run_id = %self.run_id, total, failed, "All pipelines finished");

        inputs
            .into_iter()
            .zip(slots)
            .enumerate()
            .map(|(index, (input, output))| TaskOutput {
                index,
                input,
                output,
            })
            .collect()
    }

    /// Releases the shared session and waits out the grace period.
    pub async fn shutdown(self, grace: Duration) {
        let outstanding = Arc::strong_count(&self.fetcher) - 1;
        info!(
            run_id = %self.run_id,
            fetcher = self.fetcher.name(),
            outstanding,
            grace_ms = grace.as_millis() as u64,
            "Closing session"
        );
        drop(self.fetcher);
        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("run_id", &self.run_id)
            .field("fetcher", &self.fetcher.name())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}
