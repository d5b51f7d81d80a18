//! Area listing parsing: city discovery and per-district averages.

use regex::Regex;

use crate::errors::ParseError;
use crate::models::{AreaPriceRecord, DistrictTarget};

/// Compiled extraction patterns for the area crawl.
///
/// Each pattern must have exactly two capture groups.
#[derive(Debug, Clone)]
pub struct AreaPatterns {
    target: Regex,
    district: Regex,
}

impl AreaPatterns {
    /// Compiles and checks both patterns.
    pub fn new(target: &str, district: &str) -> Result<Self, ParseError> {
        Ok(Self {
            target: compile_pair(target)?,
            district: compile_pair(district)?,
        })
    }

    /// Extracts `(url, city)` targets from the index page.
    ///
    /// Captured URLs are relative and get `url_prefix` prepended.
    #[must_use]
    pub fn discover_targets(&self, body: &str, url_prefix: &str) -> Vec<DistrictTarget> {
        self.target
            .captures_iter(body)
            .map(|caps| {
                let (path, city) = pair(&caps);
                DistrictTarget {
                    url: format!("{url_prefix}{path}"),
                    city,
                }
            })
            .collect()
    }

    /// Extracts `(district, average_price)` pairs from a city page.
    #[must_use]
    pub fn district_prices(&self, body: &str) -> Vec<AreaPriceRecord> {
        self.district
            .captures_iter(body)
            .map(|caps| {
                let (district, average_price) = pair(&caps);
                AreaPriceRecord {
                    district,
                    average_price,
                }
            })
            .collect()
    }
}

fn compile_pair(pattern: &str) -> Result<Regex, ParseError> {
    let regex = Regex::new(pattern)
        .map_err(|e| ParseError::InvalidPattern(format!("{pattern}: {e}")))?;
    // Group 0 is the whole match.
    if regex.captures_len() != 3 {
        return Err(ParseError::InvalidPattern(format!(
            "{pattern}: expected 2 capture groups, found {}",
            regex.captures_len() - 1
        )));
    }
    Ok(regex)
}

fn pair(caps: &regex::Captures<'_>) -> (String, String) {
    let group = |i| caps.get(i).map_or("", |m| m.as_str()).trim().to_string();
    (group(1), group(2))
}
