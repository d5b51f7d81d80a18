//! Testing utilities for fetch pipelines.
//!
//! This module provides:
//! - A scripted in-memory `Fetcher`
//! - Canned response bodies for the geocoder, price site and area site

pub mod fixtures;
mod mocks;

pub use mocks::{MockReply, ScriptedFetcher};
