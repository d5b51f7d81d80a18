//! Address enrichment: geocoding plus nearby price, per address.
//!
//! The two facets of an address are fetched concurrently and fail
//! independently. A facet that cannot be obtained is reported as a
//! [`FacetFailure`] and its fields keep their defaults in the merged row.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::runner::TaskRunner;
use super::pause;
use crate::aggregate::{aggregate_enrichment, ItemCompleteness, ResultTable, RunSummary};
use crate::config::{AppConfig, GeocodeConfig, PriceSiteConfig};
use crate::errors::{ParseError, Result};
use crate::fetch::{classify, with_retry, FetchOutcome, FetchRequest, Fetcher, RetryOutcome, RetryPolicy};
use crate::models::{AddressRecord, Facet, FacetFailure, ItemResult, PriceValue};
use crate::parse::{normalize_address, parse_geocode, NormalizedAddress, PricePage, PriceSelectors};

/// Everything an enrichment pipeline needs besides the fetcher.
#[derive(Debug, Clone)]
pub struct EnrichContext {
    /// Geocoding API settings.
    pub geocode: GeocodeConfig,
    /// Price site settings.
    pub price_site: PriceSiteConfig,
    /// Compiled price selectors.
    pub selectors: PriceSelectors,
    /// Retry policy for both facets.
    pub retry: RetryPolicy,
    /// Pause before every price site attempt.
    pub politeness_delay: Duration,
}

impl EnrichContext {
    /// Builds the context from the application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            geocode: config.geocode.clone(),
            price_site: config.price_site.clone(),
            selectors: PriceSelectors::from_config(&config.price_site)?,
            retry: config.retry.clone(),
            politeness_delay: config.runner.politeness_delay(),
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the politeness delay.
    #[must_use]
    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    fn geocode_request(&self, query: &str) -> FetchRequest {
        FetchRequest::get(&self.geocode.endpoint)
            .with_query("address", query)
            .with_query("output", "json")
            .with_query("ak", &self.geocode.api_key)
    }

    fn search_request(&self, keyword: &str) -> FetchRequest {
        FetchRequest::get(&self.price_site.search_url)
            .with_query(&self.price_site.keyword_param, keyword)
    }
}

/// The merged row of one address and why any facet was defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedItem {
    /// Merged row.
    pub result: ItemResult,
    /// Facets that fell back to defaults.
    pub failures: Vec<FacetFailure>,
}

impl EnrichedItem {
    /// How many facets made it into the row.
    #[must_use]
    pub fn completeness(&self) -> ItemCompleteness {
        match self.failures.len() {
            0 => ItemCompleteness::Complete,
            1 => ItemCompleteness::Partial,
            _ => ItemCompleteness::Empty,
        }
    }
}

/// Geocodes one address.
///
/// A non-zero API status is retried like a network failure. Any other
/// parse problem ends the facet immediately.
pub async fn fetch_address(
    fetcher: &dyn Fetcher,
    ctx: &EnrichContext,
    address: &NormalizedAddress,
) -> std::result::Result<AddressRecord, FacetFailure> {
    let request = ctx.geocode_request(&address.query);
    let request = &request;
    let policy = &ctx.retry;
    let shown = address.display.as_str();

    let outcome = with_retry(policy, "address", move |attempt| async move {
        debug!(address = shown, attempt, "Geocoding");
        let response = match classify(fetcher.fetch(request).await, policy).into_success() {
            Ok(response) => response,
            Err(failure) => return failure,
        };
        debug!(address = shown, duration_ms = response.duration_ms, "Geocoder answered");
        match parse_geocode(shown, &response.text) {
            Err(err) if err.is_retryable() => FetchOutcome::TransientFailure(err.to_string()),
            parsed => FetchOutcome::Success(parsed),
        }
    })
    .await;

    settle(Facet::Address, shown, outcome)
}

/// Looks up the nearby price of one address.
///
/// A search may answer with a listing, in which case the first entry's
/// detail page is fetched in the same attempt.
pub async fn fetch_price(
    fetcher: &dyn Fetcher,
    ctx: &EnrichContext,
    address: &NormalizedAddress,
) -> std::result::Result<PriceValue, FacetFailure> {
    let keyword: String = address.query.chars().filter(|c| !c.is_whitespace()).collect();
    let request = ctx.search_request(&keyword);
    let request = &request;
    let keyword = keyword.as_str();
    let policy = &ctx.retry;
    let selectors = &ctx.selectors;
    let delay = ctx.politeness_delay;

    let outcome = with_retry(policy, "price", move |attempt| async move {
        pause(delay).await;
        debug!(keyword, attempt, "Searching price");

        let search = match classify(fetcher.fetch(request).await, policy).into_success() {
            Ok(search) => search,
            Err(failure) => return failure,
        };
        debug!(keyword, duration_ms = search.duration_ms, "Search answered");

        let detail_url = match selectors.classify_search_page(&search.text, &search.final_url) {
            Ok(PricePage::Detail { price }) => return FetchOutcome::Success(Ok(price)),
            Ok(PricePage::Listing { detail_url }) => detail_url,
            Err(err) => return FetchOutcome::Success(Err(err)),
        };

        debug!(detail_url = %detail_url, "Following first listing entry");
        let detail = match classify(fetcher.fetch(&FetchRequest::get(&detail_url)).await, policy)
            .into_success()
        {
            Ok(detail) => detail,
            Err(failure) => return failure,
        };
        FetchOutcome::Success(selectors.parse_price_detail(&detail.text))
    })
    .await;

    settle(Facet::Price, &address.display, outcome)
}

// Folds a retried facet into its value or a failure note.
fn settle<T>(
    facet: Facet,
    identifier: &str,
    outcome: RetryOutcome<std::result::Result<T, ParseError>>,
) -> std::result::Result<T, FacetFailure> {
    match outcome {
        RetryOutcome::Completed { value: Ok(value), .. } => Ok(value),
        RetryOutcome::Completed {
            value: Err(err),
            attempts,
        } => {
            warn!(facet = %facet, identifier, error = %err, "Unusable response, using default");
            Err(FacetFailure::new(facet, identifier, err.to_string(), attempts))
        }
        other => Err(FacetFailure::new(
            facet,
            identifier,
            other.failure_reason().unwrap_or_default(),
            other.attempts(),
        )),
    }
}

/// Runs both facets of one address and merges them.
pub async fn enrich_address(
    fetcher: Arc<dyn Fetcher>,
    ctx: Arc<EnrichContext>,
    raw: String,
) -> EnrichedItem {
    let address = normalize_address(&raw);

    if address.query.is_empty() {
        warn!(address = %raw, "Blank address, emitting default row");
        return EnrichedItem {
            result: ItemResult::default(),
            failures: vec![
                FacetFailure::new(Facet::Address, raw.as_str(), "blank address", 0),
                FacetFailure::new(Facet::Price, raw.as_str(), "blank address", 0),
            ],
        };
    }

    let (location, price) = tokio::join!(
        fetch_address(fetcher.as_ref(), &ctx, &address),
        fetch_price(fetcher.as_ref(), &ctx, &address),
    );

    let mut failures = Vec::new();
    let location = match location {
        Ok(record) => Some(record),
        Err(failure) => {
            failures.push(failure);
            None
        }
    };
    let price = match price {
        Ok(price) => Some(price),
        Err(failure) => {
            failures.push(failure);
            None
        }
    };

    info!(
        address = %address.display,
        located = location.is_some(),
        priced = price.is_some(),
        "Address enriched"
    );

    EnrichedItem {
        result: ItemResult::merge(location, price),
        failures,
    }
}

/// Enriches every address and builds the result table in input order.
pub async fn run_enrichment(
    runner: &TaskRunner,
    ctx: EnrichContext,
    addresses: Vec<String>,
) -> (ResultTable<ItemResult>, RunSummary) {
    let ctx = Arc::new(ctx);
    let outputs = runner
        .run_all(addresses, move |fetcher, address| {
            enrich_address(fetcher, Arc::clone(&ctx), address)
        })
        .await;

    let mut summary = RunSummary::new(runner.run_id().to_string());
    let mut rows = Vec::with_capacity(outputs.len());

    for task in outputs {
        match task.output {
            Some(item) => {
                summary.record_item(item.completeness(), item.failures);
                rows.push(Some(item.result));
            }
            None => {
                summary.record_item(ItemCompleteness::Empty, Vec::new());
                rows.push(None);
            }
        }
    }

    let table = aggregate_enrichment(rows);
    summary.finish(table.len());
    (table, summary)
}
