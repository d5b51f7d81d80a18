//! End-to-end tests of both pipelines against a scripted fetcher.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use super::{crawl_areas, run_enrichment, CrawlContext, EnrichContext, TaskRunner};
use crate::aggregate::TableRow;
use crate::config::AppConfig;
use crate::fetch::{FetchRequest, RetryPolicy};
use crate::models::{AddressRecord, Facet, ItemResult, PriceValue};
use crate::parse::AreaPatterns;
use crate::testing::{fixtures, MockReply, ScriptedFetcher};

const GEO: &str = "https://geo.test/geocoding/v3/";
const SEARCH: &str = "https://price.test/ha/indexSearch.html";
const SEED: &str = "https://area.test/index.html";

fn fast_retry(attempts: usize) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(attempts)
        .with_base_delay_ms(1)
}

fn enrich_context(retry: RetryPolicy) -> EnrichContext {
    let mut config = AppConfig::default();
    config.geocode.endpoint = GEO.to_string();
    config.geocode.api_key = "test-ak".to_string();
    config.price_site.search_url = SEARCH.to_string();
    EnrichContext::from_config(&config)
        .unwrap()
        .with_retry(retry)
        .with_politeness_delay(Duration::ZERO)
}

fn is_geocode(request: &FetchRequest) -> bool {
    request.url == GEO
}

fn is_search(request: &FetchRequest) -> bool {
    request.url == SEARCH
}

fn address_of(request: &FetchRequest) -> &str {
    request.query_value("address").unwrap_or_default()
}

fn keyword_of(request: &FetchRequest) -> &str {
    request.query_value("keyword").unwrap_or_default()
}

async fn enrich(
    fetcher: Arc<ScriptedFetcher>,
    retry: RetryPolicy,
    addresses: &[&str],
) -> (Vec<ItemResult>, crate::aggregate::RunSummary) {
    let runner = TaskRunner::new(fetcher, 3);
    let (table, summary) = run_enrichment(
        &runner,
        enrich_context(retry),
        addresses.iter().map(|a| (*a).to_string()).collect(),
    )
    .await;
    runner.shutdown(Duration::ZERO).await;
    (table.into_rows(), summary)
}

#[tokio::test]
async fn test_three_address_scenario() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        if is_geocode(req) {
            match address_of(req) {
                "Addr-AddrFails" => MockReply::status(503, ""),
                _ => MockReply::ok(fixtures::geocode_ok(116.3, 39.9)),
            }
        } else if is_search(req) {
            match keyword_of(req) {
                "Addr-PriceFails" => MockReply::transport("connection reset"),
                _ => MockReply::ok(fixtures::price_detail_page("52,000")),
            }
        } else {
            MockReply::status(404, "")
        }
    }));

    let (rows, summary) = enrich(
        fetcher.clone(),
        fast_retry(5),
        &["Addr-OK", "Addr-AddrFails", "Addr-PriceFails"],
    )
    .await;

    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0].location.address, "Addr-OK");
    assert_eq!(rows[0].location.lng, 116.3);
    assert_eq!(rows[0].location.level, "门址");
    assert_eq!(rows[0].price, PriceValue::Numeric(52000));

    assert_eq!(rows[1].location, AddressRecord::default());
    assert_eq!(rows[1].price, PriceValue::Numeric(52000));

    assert_eq!(rows[2].location.address, "Addr-PriceFails");
    assert_eq!(rows[2].location.lat, 39.9);
    assert_eq!(rows[2].price, PriceValue::default());

    assert_eq!(
        fetcher.count_matching(|r| is_geocode(r) && address_of(r) == "Addr-AddrFails"),
        5
    );
    assert_eq!(
        fetcher.count_matching(|r| is_search(r) && keyword_of(r) == "Addr-PriceFails"),
        5
    );

    assert_eq!(summary.total_items, 3);
    assert_eq!(summary.complete_items, 1);
    assert_eq!(summary.partial_items, 2);
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.failures_by_facet().get(&Facet::Address), Some(&1));
    assert_eq!(summary.failures_by_facet().get(&Facet::Price), Some(&1));
}

#[tokio::test]
async fn test_order_preserved_under_skewed_latency() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        let key = if is_geocode(req) { address_of(req) } else { keyword_of(req) };
        let delay = match key {
            "a1" => 60,
            "a3" => 30,
            "a5" => 10,
            _ => 0,
        };
        let reply = if is_geocode(req) {
            MockReply::ok(fixtures::geocode_ok(1.0, 2.0))
        } else {
            MockReply::ok(fixtures::price_detail_page("100"))
        };
        reply.after(Duration::from_millis(delay))
    }));

    let addresses = ["a1", "a2", "a3", "a4", "a5", "a6"];
    let (rows, _) = enrich(fetcher, fast_retry(5), &addresses).await;

    let order: Vec<&str> = rows.iter().map(|r| r.location.address.as_str()).collect();
    assert_eq!(order, addresses.to_vec());
}

#[tokio::test]
async fn test_request_concurrency_bound_across_facets() {
    for concurrency in [1, 2] {
        let fetcher = Arc::new(ScriptedFetcher::new(|req| {
            let reply = if is_geocode(req) {
                MockReply::ok(fixtures::geocode_ok(1.0, 2.0))
            } else {
                MockReply::ok(fixtures::price_detail_page("100"))
            };
            reply.after(Duration::from_millis(50))
        }));
        let runner = TaskRunner::new(fetcher.clone(), concurrency);
        let (table, summary) = run_enrichment(
            &runner,
            enrich_context(fast_retry(1)),
            vec!["a1".to_string(), "a2".to_string(), "a3".to_string()],
        )
        .await;

        assert_eq!(table.len(), 3);
        assert_eq!(summary.complete_items, 3);
        assert_eq!(fetcher.call_count(), 6);
        assert!(
            fetcher.peak_in_flight() <= concurrency,
            "peak {} over limit {concurrency}",
            fetcher.peak_in_flight()
        );
        assert!(fetcher.recorded().iter().all(|r| is_geocode(r) || is_search(r)));
    }
}

#[tokio::test]
async fn test_retry_budget_is_exact() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        if is_geocode(req) {
            MockReply::ok(fixtures::geocode_status(302))
        } else {
            MockReply::ok(fixtures::price_detail_page("1"))
        }
    }));

    let (rows, summary) = enrich(fetcher.clone(), fast_retry(3), &["somewhere"]).await;

    assert_eq!(fetcher.count_matching(is_geocode), 3);
    assert_eq!(rows[0].location, AddressRecord::default());
    assert_eq!(summary.failures[0].attempts, 3);
    assert_eq!(summary.failures[0].reason, "Application status 302");
}

#[tokio::test]
async fn test_shape_error_is_not_retried() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        if is_geocode(req) {
            MockReply::ok(r#"{"status": 0}"#)
        } else {
            MockReply::ok("<html><body>nothing here</body></html>")
        }
    }));

    let (rows, summary) = enrich(fetcher.clone(), fast_retry(5), &["somewhere"]).await;

    assert_eq!(fetcher.count_matching(is_geocode), 1);
    assert_eq!(fetcher.count_matching(is_search), 1);
    assert_eq!(rows[0], ItemResult::default());
    assert_eq!(summary.empty_items, 1);
}

#[tokio::test]
async fn test_all_facets_failing_yields_default_row() {
    let fetcher = Arc::new(ScriptedFetcher::new(|_| MockReply::status(500, "")));

    let (rows, summary) = enrich(fetcher, fast_retry(2), &["nowhere"]).await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], ItemResult::default());
    assert_eq!(
        rows[0].cells(),
        vec!["", "0", "0", "0", "0", "0", "无", "0"]
    );
    assert_eq!(summary.empty_items, 1);
    assert_eq!(summary.failures.len(), 2);
}

#[tokio::test]
async fn test_placeholder_price_kept_as_text() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        if is_geocode(req) {
            MockReply::ok(fixtures::geocode_ok(1.0, 2.0))
        } else {
            MockReply::ok(fixtures::price_detail_page("--"))
        }
    }));

    let (rows, _) = enrich(fetcher, fast_retry(5), &["somewhere"]).await;
    assert_eq!(rows[0].price, PriceValue::RawText("--".to_string()));
}

#[tokio::test]
async fn test_listing_follows_one_detail_page() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        if is_geocode(req) {
            MockReply::ok(fixtures::geocode_ok(1.0, 2.0))
        } else if is_search(req) {
            MockReply::ok(fixtures::price_listing_page("/ha/detail-1.html"))
        } else if req.url == "https://price.test/ha/detail-1.html" {
            MockReply::ok(fixtures::price_detail_page("8,800"))
        } else {
            MockReply::status(404, "")
        }
    }));

    let (rows, _) = enrich(fetcher.clone(), fast_retry(5), &["幸福 小区"]).await;

    assert_eq!(rows[0].price, PriceValue::Numeric(8800));
    assert_eq!(fetcher.count_matching(is_search), 1);
    assert_eq!(fetcher.count_matching(|r| r.url.ends_with("detail-1.html")), 1);
    assert_eq!(fetcher.call_count(), 3);

    let search = fetcher.recorded().into_iter().find(|r| is_search(r)).unwrap();
    assert_eq!(search.query_value("keyword"), Some("幸福小区"));
}

#[tokio::test]
async fn test_fatal_status_aborts_without_retry() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        if is_geocode(req) {
            MockReply::ok(fixtures::geocode_ok(1.0, 2.0))
        } else {
            MockReply::status(403, "")
        }
    }));

    let (rows, summary) =
        enrich(fetcher.clone(), fast_retry(5).with_fatal_status(403), &["somewhere"]).await;

    assert_eq!(fetcher.count_matching(is_search), 1);
    assert_eq!(rows[0].price, PriceValue::default());
    assert_eq!(summary.failures[0].facet, Facet::Price);
    assert_eq!(summary.failures[0].attempts, 1);
}

#[tokio::test]
async fn test_blank_and_hash_addresses() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        if is_geocode(req) {
            MockReply::ok(fixtures::geocode_ok(1.0, 2.0))
        } else {
            MockReply::ok(fixtures::price_detail_page("300"))
        }
    }));

    let (rows, summary) = enrich(fetcher.clone(), fast_retry(5), &["   ", "海淀区上地#3栋"]).await;

    assert_eq!(rows[0], ItemResult::default());
    assert_eq!(rows[1].location.address, "海淀区上地&3栋");
    assert_eq!(rows[1].price, PriceValue::Numeric(300));

    let geocoded: Vec<String> = fetcher
        .recorded()
        .iter()
        .filter(|r| is_geocode(r))
        .map(|r| address_of(r).to_string())
        .collect();
    assert_eq!(geocoded, vec!["海淀区上地".to_string()]);
    assert_eq!(summary.empty_items, 1);
    assert_eq!(summary.complete_items, 1);
}

#[tokio::test]
async fn test_panicking_item_still_gets_a_row() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| {
        assert!(address_of(req) != "explodes", "scripted panic");
        if is_geocode(req) {
            MockReply::ok(fixtures::geocode_ok(1.0, 2.0))
        } else {
            MockReply::ok(fixtures::price_detail_page("7"))
        }
    }));

    let (rows, summary) = enrich(fetcher, fast_retry(2), &["fine", "explodes", "also fine"]).await;

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].location.address, "fine");
    assert_eq!(rows[1], ItemResult::default());
    assert_eq!(rows[2].location.address, "also fine");
    assert_eq!(summary.empty_items, 1);
}

fn crawl_context(retry: RetryPolicy) -> CrawlContext {
    let patterns = AreaPatterns::new(fixtures::TARGET_PATTERN, fixtures::DISTRICT_PATTERN).unwrap();
    CrawlContext::new(patterns, "https://area.test", retry)
}

#[tokio::test]
async fn test_area_crawl_flattens_and_dedups() {
    let fetcher = Arc::new(ScriptedFetcher::new(|req| match req.url.as_str() {
        SEED => MockReply::ok(fixtures::area_index_page(&[
            ("/bj.html", "北京"),
            ("/gz.html", "广州"),
            ("/sh.html", "上海"),
            ("/bj.html", "北京"),
        ])),
        "https://area.test/bj.html" => MockReply::ok(fixtures::area_city_page(&[
            ("朝阳", "65,000"),
            ("海淀", "80000"),
        ])),
        "https://area.test/sh.html" => {
            MockReply::ok(fixtures::area_city_page(&[("浦东", "60000")]))
                .after(Duration::from_millis(20))
        }
        _ => MockReply::status(503, ""),
    }));

    let runner = TaskRunner::new(fetcher.clone(), 2);
    let (table, summary) = crawl_areas(&runner, crawl_context(fast_retry(3)), SEED).await;

    let rows: Vec<Vec<String>> = table.rows().iter().map(TableRow::cells).collect();
    assert_eq!(
        rows,
        vec![
            vec!["北京", "朝阳", "65,000"],
            vec!["北京", "海淀", "80000"],
            vec!["上海", "浦东", "60000"],
        ]
    );

    assert_eq!(fetcher.count_matching(|r| r.url == SEED), 1);
    assert_eq!(fetcher.count_matching(|r| r.url.ends_with("/gz.html")), 3);
    assert_eq!(summary.total_items, 4);
    assert_eq!(summary.failures_by_facet().get(&Facet::District), Some(&1));
    assert_eq!(summary.rows, 3);
}

#[tokio::test]
async fn test_area_crawl_discovery_failure() {
    let fetcher = Arc::new(ScriptedFetcher::new(|_| MockReply::status(500, "")));

    let runner = TaskRunner::new(fetcher.clone(), 2);
    let (table, summary) = crawl_areas(&runner, crawl_context(fast_retry(2)), SEED).await;

    assert!(table.is_empty());
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(summary.total_items, 0);
    assert_eq!(summary.failures[0].facet, Facet::Discovery);
}
