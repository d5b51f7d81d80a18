//! Area price crawl: one index page, then every city page it links to.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::pause;
use super::runner::TaskRunner;
use crate::aggregate::{aggregate_areas, ItemCompleteness, ResultTable, RunSummary};
use crate::config::AppConfig;
use crate::errors::{HousePriceError, Result};
use crate::fetch::{
    classify, with_retry, FetchRequest, FetchResult, Fetcher, RetryOutcome, RetryPolicy,
};
use crate::models::{AreaPriceRow, CityAreaPrices, DistrictTarget, Facet, FacetFailure};
use crate::parse::AreaPatterns;

/// Settings shared by every step of the crawl.
#[derive(Debug, Clone)]
pub struct CrawlContext {
    /// Compiled extraction patterns.
    pub patterns: AreaPatterns,
    /// Prefix for discovered relative URLs.
    pub url_prefix: String,
    /// Retry policy for every page.
    pub retry: RetryPolicy,
    /// Pause before each city page attempt.
    pub politeness_delay: Duration,
}

impl CrawlContext {
    /// Creates a context from explicit parts.
    #[must_use]
    pub fn new(patterns: AreaPatterns, url_prefix: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            patterns,
            url_prefix: url_prefix.into(),
            retry,
            politeness_delay: Duration::ZERO,
        }
    }

    /// Builds the context from the `area` section of the config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let area = &config.area;
        if area.target_pattern.is_empty() || area.district_pattern.is_empty() {
            return Err(HousePriceError::config(
                "area.target_pattern and area.district_pattern are required",
            ));
        }
        let patterns = AreaPatterns::new(&area.target_pattern, &area.district_pattern)?;
        Ok(Self::new(patterns, &area.url_prefix, config.retry.clone())
            .with_politeness_delay(config.runner.politeness_delay()))
    }

    /// Sets the politeness delay.
    #[must_use]
    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }
}

fn page_text(page: FetchResult) -> String {
    debug!(url = %page.final_url, duration_ms = page.duration_ms, "Page fetched");
    page.text
}

/// Fetches the index page and extracts the city targets.
///
/// Runs once, before any city page is requested.
pub async fn discover(
    fetcher: &dyn Fetcher,
    ctx: &CrawlContext,
    seed_url: &str,
) -> std::result::Result<Vec<DistrictTarget>, FacetFailure> {
    let request = FetchRequest::get(seed_url);
    let request = &request;
    let policy = &ctx.retry;

    let outcome = with_retry(policy, "discovery", move |_| async move {
        classify(fetcher.fetch(request).await, policy).map(page_text)
    })
    .await;

    match outcome {
        RetryOutcome::Completed { value, .. } => {
            let targets = ctx.patterns.discover_targets(&value, &ctx.url_prefix);
            info!(seed = seed_url, targets = targets.len(), "Discovered city pages");
            Ok(targets)
        }
        other => Err(FacetFailure::new(
            Facet::Discovery,
            seed_url,
            other.failure_reason().unwrap_or_default(),
            other.attempts(),
        )),
    }
}

/// Fetches one city page and extracts its district averages.
pub async fn crawl_city(
    fetcher: &dyn Fetcher,
    ctx: &CrawlContext,
    target: &DistrictTarget,
) -> std::result::Result<CityAreaPrices, FacetFailure> {
    let request = FetchRequest::get(&target.url);
    let request = &request;
    let policy = &ctx.retry;
    let delay = ctx.politeness_delay;

    let outcome = with_retry(policy, "district", move |_| async move {
        pause(delay).await;
        classify(fetcher.fetch(request).await, policy).map(page_text)
    })
    .await;

    match outcome {
        RetryOutcome::Completed { value, .. } => {
            let districts = ctx.patterns.district_prices(&value);
            if districts.is_empty() {
                warn!(city = %target.city, url = %target.url, "No district rows on city page");
            }
            Ok(CityAreaPrices {
                city: target.city.clone(),
                districts,
            })
        }
        other => Err(FacetFailure::new(
            Facet::District,
            &target.url,
            other.failure_reason().unwrap_or_default(),
            other.attempts(),
        )),
    }
}

/// Crawls the seed page and all discovered city pages.
///
/// A failed discovery yields an empty table; failed city pages contribute
/// no rows.
pub async fn crawl_areas(
    runner: &TaskRunner,
    ctx: CrawlContext,
    seed_url: &str,
) -> (ResultTable<AreaPriceRow>, RunSummary) {
    let mut summary = RunSummary::new(runner.run_id().to_string());
    let fetcher = runner.fetcher();

    let targets = match discover(fetcher.as_ref(), &ctx, seed_url).await {
        Ok(targets) => targets,
        Err(failure) => {
            warn!(seed = seed_url, reason = %failure.reason, "Discovery failed, nothing to crawl");
            summary.record_failure(failure);
            summary.finish(0);
            return (ResultTable::default(), summary);
        }
    };
    drop(fetcher);

    let ctx = Arc::new(ctx);
    let outputs = runner
        .run_all(targets, move |fetcher, target| {
            let ctx = Arc::clone(&ctx);
            async move { crawl_city(fetcher.as_ref(), &ctx, &target).await }
        })
        .await;

    let mut cities = Vec::with_capacity(outputs.len());
    for task in outputs {
        match task.output {
            Some(Ok(city)) => {
                let completeness = if city.districts.is_empty() {
                    ItemCompleteness::Empty
                } else {
                    ItemCompleteness::Complete
                };
                summary.record_item(completeness, Vec::new());
                cities.push(Some(city));
            }
            Some(Err(failure)) => {
                summary.record_item(ItemCompleteness::Empty, vec![failure]);
                cities.push(None);
            }
            None => {
                summary.record_item(ItemCompleteness::Empty, Vec::new());
                cities.push(None);
            }
        }
    }

    let table = aggregate_areas(cities);
    summary.finish(table.len());
    (table, summary)
}
