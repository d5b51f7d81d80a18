//! Price site page parsing.
//!
//! A search can land on a listing of candidate estates or directly on an
//! estate's detail page. Listings point at the detail page to fetch next.

use scraper::{ElementRef, Html, Selector};

use crate::config::PriceSiteConfig;
use crate::errors::ParseError;
use crate::models::PriceValue;

/// What a price search returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricePage {
    /// A listing page; the first entry's detail page must be fetched.
    Listing {
        /// Absolute URL of the first candidate's detail page.
        detail_url: String,
    },
    /// A detail page carrying the price.
    Detail {
        /// Parsed price.
        price: PriceValue,
    },
}

/// Compiled selectors for the price site.
#[derive(Debug, Clone)]
pub struct PriceSelectors {
    detail_link: Selector,
    price: Selector,
}

impl PriceSelectors {
    /// Compiles the two selectors.
    pub fn new(detail_link: &str, price: &str) -> Result<Self, ParseError> {
        Ok(Self {
            detail_link: compile(detail_link)?,
            price: compile(price)?,
        })
    }

    /// Compiles the selectors named in the site config.
    pub fn from_config(config: &PriceSiteConfig) -> Result<Self, ParseError> {
        Self::new(&config.detail_link_selector, &config.price_selector)
    }

    /// Classifies a search response.
    ///
    /// The listing check comes first: a listing page may also render a
    /// summary price that does not belong to any single estate.
    pub fn classify_search_page(&self, body: &str, page_url: &str) -> Result<PricePage, ParseError> {
        let document = Html::parse_document(body);

        let href = document
            .select(&self.detail_link)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty());

        if let Some(href) = href {
            return Ok(PricePage::Listing {
                detail_url: resolve_url(page_url, href),
            });
        }

        self.price_in(&document)
            .map(|price| PricePage::Detail { price })
    }

    /// Extracts the price from a detail page.
    pub fn parse_price_detail(&self, body: &str) -> Result<PriceValue, ParseError> {
        let document = Html::parse_document(body);
        self.price_in(&document)
    }

    fn price_in(&self, document: &Html) -> Result<PriceValue, ParseError> {
        document
            .select(&self.price)
            .next()
            .map(|el| coerce_price(&element_text(el)))
            .ok_or_else(|| ParseError::MissingElement("price".to_string()))
    }
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|_| ParseError::InvalidPattern(selector.to_string()))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

fn resolve_url(base: &str, href: &str) -> String {
    reqwest::Url::parse(base)
        .and_then(|base| base.join(href))
        .map_or_else(|_| href.to_string(), |url| url.to_string())
}

/// Converts displayed price text into a `PriceValue`.
///
/// Thousands separators are stripped before the integer parse; text that
/// still does not parse (such as `--`) is kept verbatim.
#[must_use]
pub fn coerce_price(raw: &str) -> PriceValue {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| *c != ',').collect();
    digits
        .parse::<i64>()
        .map_or_else(|_| PriceValue::RawText(trimmed.to_string()), PriceValue::Numeric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use pretty_assertions::assert_eq;

    fn selectors() -> PriceSelectors {
        PriceSelectors::from_config(&PriceSiteConfig::default()).unwrap()
    }

    #[test]
    fn test_coerce_price() {
        assert_eq!(coerce_price("1,234"), PriceValue::Numeric(1234));
        assert_eq!(coerce_price(" 56,789 "), PriceValue::Numeric(56789));
        assert_eq!(coerce_price("--"), PriceValue::RawText("--".to_string()));
        assert_eq!(coerce_price("1,234.5"), PriceValue::RawText("1,234.5".to_string()));
    }

    #[test]
    fn test_detail_page() {
        let selectors = selectors();
        let page = selectors
            .classify_search_page(&fixtures::price_detail_page("32,150"), "https://m.example.com/ha/x")
            .unwrap();
        assert_eq!(page, PricePage::Detail { price: PriceValue::Numeric(32150) });
    }

    #[test]
    fn test_listing_page_resolves_relative_link() {
        let selectors = selectors();
        let page = selectors
            .classify_search_page(
                &fixtures::price_listing_page("/ha/detail/42.html"),
                "https://m.example.com/ha/indexSearch.html",
            )
            .unwrap();
        assert_eq!(
            page,
            PricePage::Listing { detail_url: "https://m.example.com/ha/detail/42.html".to_string() }
        );
    }

    #[test]
    fn test_listing_page_keeps_absolute_link() {
        let selectors = selectors();
        let page = selectors
            .classify_search_page(
                &fixtures::price_listing_page("https://other.example.com/d/1"),
                "not a url",
            )
            .unwrap();
        assert_eq!(
            page,
            PricePage::Listing { detail_url: "https://other.example.com/d/1".to_string() }
        );
    }

    #[test]
    fn test_missing_price_element() {
        let selectors = selectors();
        let err = selectors.parse_price_detail("<html><body>维护中</body></html>").unwrap_err();
        assert_eq!(err, ParseError::MissingElement("price".to_string()));

        let err = selectors.classify_search_page("", "https://m.example.com").unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_placeholder_price_kept() {
        let selectors = selectors();
        let price = selectors.parse_price_detail(&fixtures::price_detail_page("--")).unwrap();
        assert_eq!(price, PriceValue::RawText("--".to_string()));
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            PriceSelectors::new("a[", ".price"),
            Err(ParseError::InvalidPattern(_))
        ));
    }
}
