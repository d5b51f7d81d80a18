//! Per-identifier pipelines and the runner that fans them out.
//!
//! This module provides:
//! - A bounded-concurrency task runner
//! - The address enrichment pipeline
//! - The area price crawl

mod crawl;
mod enrich;
mod runner;

#[cfg(test)]
mod integration_tests;

pub use crawl::{crawl_areas, crawl_city, discover, CrawlContext};
pub use enrich::{
    enrich_address, fetch_address, fetch_price, run_enrichment, EnrichContext, EnrichedItem,
};
pub use runner::{TaskOutput, TaskRunner};

use std::time::Duration;

// Sleeps unless the delay is zero.
async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
