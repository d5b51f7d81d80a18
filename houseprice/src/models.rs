//! Records produced by parsers and merged into result rows.
//!
//! Every record is total: absent sub-fields take a default value instead of
//! being left out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Level reported when the geocoder gave none.
pub const DEFAULT_LEVEL: &str = "无";

/// Geocoding facet of an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// The address as submitted.
    pub address: String,
    /// Longitude.
    pub lng: f64,
    /// Latitude.
    pub lat: f64,
    /// Whether the match is exact (1) or fuzzy (0).
    pub precise: i64,
    /// Absolute precision confidence.
    pub confidence: i64,
    /// Address comprehension score.
    pub comprehension: i64,
    /// Matched address level.
    pub level: String,
}

impl Default for AddressRecord {
    fn default() -> Self {
        Self {
            address: String::new(),
            lng: 0.0,
            lat: 0.0,
            precise: 0,
            confidence: 0,
            comprehension: 0,
            level: DEFAULT_LEVEL.to_string(),
        }
    }
}

/// A price that is either a number or the site's literal placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    /// A parsed integer price.
    Numeric(i64),
    /// Text that did not parse as a number, such as `--`.
    RawText(String),
}

impl Default for PriceValue {
    fn default() -> Self {
        Self::RawText("0".to_string())
    }
}

impl PriceValue {
    /// The numeric value, if any.
    #[must_use]
    pub const fn as_number(&self) -> Option<i64> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::RawText(_) => None,
        }
    }
}

impl fmt::Display for PriceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::RawText(text) => f.write_str(text),
        }
    }
}

/// One merged output row of the enrichment run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemResult {
    /// Address facet, defaulted when unavailable.
    #[serde(flatten)]
    pub location: AddressRecord,
    /// Price facet, defaulted when unavailable.
    pub price: PriceValue,
}

impl ItemResult {
    /// Starts from the default row and overwrites whichever facets are present.
    #[must_use]
    pub fn merge(location: Option<AddressRecord>, price: Option<PriceValue>) -> Self {
        let mut result = Self::default();
        if let Some(location) = location {
            result.location = location;
        }
        if let Some(price) = price {
            result.price = price;
        }
        result
    }
}

/// One district price extracted from a city page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaPriceRecord {
    /// District name.
    pub district: String,
    /// Average price as shown on the page.
    pub average_price: String,
}

/// A second-level page discovered on the index page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistrictTarget {
    /// Absolute URL of the city page.
    pub url: String,
    /// City name.
    pub city: String,
}

/// Everything harvested from one city page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityAreaPrices {
    /// City name.
    pub city: String,
    /// District prices in page order.
    pub districts: Vec<AreaPriceRecord>,
}

/// One flattened output row of the area crawl.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaPriceRow {
    /// City name.
    pub city: String,
    /// District name.
    pub district: String,
    /// Average price as shown on the page.
    pub average_price: String,
}

/// An independently fetched piece of information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    /// Geocoding of an address.
    Address,
    /// Nearby price of an address.
    Price,
    /// Index page listing the cities.
    Discovery,
    /// District averages of one city page.
    District,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Price => write!(f, "price"),
            Self::Discovery => write!(f, "discovery"),
            Self::District => write!(f, "district"),
        }
    }
}

/// Why one facet of one identifier fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetFailure {
    /// Facet that failed.
    pub facet: Facet,
    /// Identifier being processed (address or URL).
    pub identifier: String,
    /// Last reported reason.
    pub reason: String,
    /// Attempts spent.
    pub attempts: usize,
}

impl FacetFailure {
    /// Creates a failure note.
    #[must_use]
    pub fn new(
        facet: Facet,
        identifier: impl Into<String>,
        reason: impl Into<String>,
        attempts: usize,
    ) -> Self {
        Self {
            facet,
            identifier: identifier.into(),
            reason: reason.into(),
            attempts,
        }
    }
}
