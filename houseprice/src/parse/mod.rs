//! Response parsers.
//!
//! Parsers are pure: they take a response body and return either a total
//! record or a `ParseError`. They never perform I/O and never panic on
//! malformed input.

mod area;
mod geocode;
mod price;

pub use area::AreaPatterns;
pub use geocode::{normalize_address, parse_geocode, NormalizedAddress};
pub use price::{coerce_price, PricePage, PriceSelectors};
