//! Merging per-identifier outcomes into result tables.
//!
//! Enrichment tables keep input order and always have one row per input.
//! Area tables are flattened per district and de-duplicated by value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::models::{AreaPriceRow, CityAreaPrices, Facet, FacetFailure, ItemResult};

/// A row that can be written as a table record.
pub trait TableRow {
    /// Column names, in order.
    fn header() -> &'static [&'static str];

    /// Cell values, in column order.
    fn cells(&self) -> Vec<String>;
}

impl TableRow for ItemResult {
    fn header() -> &'static [&'static str] {
        &[
            "address",
            "lng",
            "lat",
            "precise",
            "confidence",
            "comprehension",
            "level",
            "price",
        ]
    }

    fn cells(&self) -> Vec<String> {
        let location = &self.location;
        vec![
            location.address.clone(),
            location.lng.to_string(),
            location.lat.to_string(),
            location.precise.to_string(),
            location.confidence.to_string(),
            location.comprehension.to_string(),
            location.level.clone(),
            self.price.to_string(),
        ]
    }
}

impl TableRow for AreaPriceRow {
    fn header() -> &'static [&'static str] {
        &["city", "district", "averagePrice"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.city.clone(),
            self.district.clone(),
            self.average_price.clone(),
        ]
    }
}

/// Ordered rows ready for a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable<R> {
    rows: Vec<R>,
}

impl<R> ResultTable<R> {
    /// Wraps rows as they are.
    #[must_use]
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Borrowed rows.
    #[must_use]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Owned rows.
    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }
}

impl<R> Default for ResultTable<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: TableRow> ResultTable<R> {
    /// Column names.
    #[must_use]
    pub fn header(&self) -> &'static [&'static str] {
        R::header()
    }
}

/// Builds the enrichment table in input order.
///
/// `None` stands for an item whose pipeline produced nothing at all; it
/// still gets a row, filled with defaults.
pub fn aggregate_enrichment<I>(outcomes: I) -> ResultTable<ItemResult>
where
    I: IntoIterator<Item = Option<ItemResult>>,
{
    let rows = outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| {
            outcome.unwrap_or_else(|| {
                warn!(index, "No result for item, emitting default row");
                ItemResult::default()
            })
        })
        .collect();
    ResultTable::new(rows)
}

/// Flattens city results into one row per district, dropping exact duplicates.
///
/// The first occurrence of a duplicate row keeps its position.
pub fn aggregate_areas<I>(outcomes: I) -> ResultTable<AreaPriceRow>
where
    I: IntoIterator<Item = Option<CityAreaPrices>>,
{
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut duplicates = 0usize;

    for city in outcomes.into_iter().flatten() {
        for district in city.districts {
            let row = AreaPriceRow {
                city: city.city.clone(),
                district: district.district,
                average_price: district.average_price,
            };
            if seen.insert(row.clone()) {
                rows.push(row);
            } else {
                duplicates += 1;
            }
        }
    }

    if duplicates > 0 {
        info!(duplicates, kept = rows.len(), "Dropped duplicate area rows");
    }
    ResultTable::new(rows)
}

/// How complete one item ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCompleteness {
    /// Every facet succeeded.
    Complete,
    /// Some facets fell back to defaults.
    Partial,
    /// No facet succeeded.
    Empty,
}

/// Summary of one run, logged when the run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of identifiers processed.
    pub total_items: usize,
    /// Items with every facet present.
    pub complete_items: usize,
    /// Items with some facets defaulted.
    pub partial_items: usize,
    /// Items with nothing fetched.
    pub empty_items: usize,
    /// Rows in the final table.
    pub rows: usize,
    /// Every facet failure, in the order recorded.
    pub failures: Vec<FacetFailure>,
}

impl RunSummary {
    /// Starts a summary.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            total_items: 0,
            complete_items: 0,
            partial_items: 0,
            empty_items: 0,
            rows: 0,
            failures: Vec::new(),
        }
    }

    /// Records one processed item.
    pub fn record_item(&mut self, completeness: ItemCompleteness, failures: Vec<FacetFailure>) {
        self.total_items += 1;
        match completeness {
            ItemCompleteness::Complete => self.complete_items += 1,
            ItemCompleteness::Partial => self.partial_items += 1,
            ItemCompleteness::Empty => self.empty_items += 1,
        }
        self.failures.extend(failures);
    }

    /// Records a failure not tied to an item, such as discovery.
    pub fn record_failure(&mut self, failure: FacetFailure) {
        self.failures.push(failure);
    }

    /// Marks the run finished with the final row count.
    pub fn finish(&mut self, rows: usize) {
        self.rows = rows;
        self.finished_at = Some(Utc::now());
    }

    /// Share of items that completed fully.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        self.complete_items as f64 / self.total_items as f64
    }

    /// Failure counts per facet.
    #[must_use]
    pub fn failures_by_facet(&self) -> HashMap<Facet, usize> {
        let mut counts = HashMap::new();
        for failure in &self.failures {
            *counts.entry(failure.facet).or_insert(0) += 1;
        }
        counts
    }

    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Logs the summary.
    pub fn log(&self) {
        let elapsed_ms = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds());
        info!(
            run_id = %self.run_id,
            total = self.total_items,
            complete = self.complete_items,
            partial = self.partial_items,
            empty = self.empty_items,
            rows = self.rows,
            failures = self.failures.len(),
            success_rate = self.success_rate(),
            elapsed_ms,
            "Run finished"
        );
        for (facet, count) in self.failures_by_facet() {
            warn!(run_id = %self.run_id, facet = %facet, count, "Facet fell back to defaults");
        }
    }
}
