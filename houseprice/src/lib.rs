//! # Houseprice
//!
//! Concurrent fetch, parse and merge of housing data from public web
//! sources.
//!
//! Two runs are supported:
//!
//! - **Address enrichment**: every address is geocoded and looked up on a
//!   price site; both facets are fetched concurrently and merged into one
//!   row per address, with defaults standing in for whatever failed.
//! - **Area crawl**: an index page is scanned for city pages, each city page
//!   is scraped for per-district average prices, and the rows are
//!   flattened and de-duplicated.
//!
//! Every request goes through bounded retry, and every identifier runs in
//! its own task under a shared concurrency limit.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use houseprice::prelude::*;
//!
//! let config = AppConfig::default();
//! let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
//! let runner = TaskRunner::new(fetcher, config.runner.concurrency);
//!
//! let (table, summary) =
//!     run_enrichment(&runner, EnrichContext::from_config(&config)?, addresses).await;
//! write_csv("result.csv", &table, false)?;
//! runner.shutdown(config.runner.shutdown_grace()).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

pub mod aggregate;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod models;
pub mod observability;
pub mod parse;
pub mod pipeline;
pub mod sink;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::{
        aggregate_areas, aggregate_enrichment, ResultTable, RunSummary, TableRow,
    };
    pub use crate::config::{AppConfig, FetchConfig, RunnerConfig};
    pub use crate::errors::{FetchError, HousePriceError, ParseError};
    pub use crate::fetch::{
        with_retry, FetchOutcome, FetchRequest, FetchResult, Fetcher, HttpFetcher,
        RetryOutcome, RetryPolicy,
    };
    pub use crate::models::{AddressRecord, AreaPriceRow, ItemResult, PriceValue};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        crawl_areas, run_enrichment, CrawlContext, EnrichContext, TaskRunner,
    };
    pub use crate::sink::write_csv;
    pub use std::sync::Arc;
}
