//! Canned response bodies.

/// Target pattern matching `area_index_page` output.
pub const TARGET_PATTERN: &str = r#"<a class="city" href="([^"]+)">([^<]+)</a>"#;

/// District pattern matching `area_city_page` output.
pub const DISTRICT_PATTERN: &str =
    r#"<td class="district">([^<]+)</td>\s*<td class="price">([^<]+)</td>"#;

/// A successful geocoding response.
#[must_use]
pub fn geocode_ok(lng: f64, lat: f64) -> String {
    serde_json::json!({
        "status": 0,
        "result": {
            "location": {"lng": lng, "lat": lat},
            "precise": 1,
            "confidence": 80,
            "comprehension": 100,
            "level": "门址"
        }
    })
    .to_string()
}

/// A geocoding response rejected with an application status.
#[must_use]
pub fn geocode_status(status: i64) -> String {
    serde_json::json!({"status": status, "message": "rejected"}).to_string()
}

/// A price detail page showing `price`.
#[must_use]
pub fn price_detail_page(price: &str) -> String {
    format!(
        r#"<html><body>
<div class="cont_01">
  <div class="data"><div class="fl"><span>{price}</span>元/㎡</div><div class="fr">环比上月</div></div>
</div>
</body></html>"#
    )
}

/// A price listing page whose first result links to `href`.
#[must_use]
pub fn price_listing_page(href: &str) -> String {
    format!(
        r#"<html><body>
<div class="searchlist"><ul>
  <li><a href="{href}">幸福小区</a></li>
  <li><a href="/ha/other.html">幸福家园</a></li>
</ul></div>
</body></html>"#
    )
}

/// An index page linking to city pages.
#[must_use]
pub fn area_index_page(cities: &[(&str, &str)]) -> String {
    let links: String = cities
        .iter()
        .map(|(href, city)| format!(r#"<li><a class="city" href="{href}">{city}</a></li>"#))
        .collect();
    format!("<html><body><ul>{links}</ul></body></html>")
}

/// A city page with one table row per district.
#[must_use]
pub fn area_city_page(districts: &[(&str, &str)]) -> String {
    let rows: String = districts
        .iter()
        .map(|(district, price)| {
            format!(
                "<tr>\n<td class=\"district\">{district}</td>\n<td class=\"price\">{price}</td>\n</tr>"
            )
        })
        .collect();
    format!("<html><body><table>{rows}</table></body></html>")
}
