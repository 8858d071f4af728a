//! Best-effort harvesting of price history from a third-party tracker site.
//!
//! The target pages are not under our control and change without notice. The
//! harvester only returns a series it could read verbatim from structured page
//! data; anything ambiguous yields an empty history. It never interpolates.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use pricewatch_core::{
    DataSource, HistorySource, PriceHistory, PricePoint, PriceWatchError, PriceWatchResult,
};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;

use crate::url::product_identifier;

const DEFAULT_BASE_URL: &str = "https://pricehistoryapp.com";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const HISTORY_KEYS: &[&str] = &["priceHistory", "price_history", "priceHistoryData", "history"];
const DATE_KEYS: &[&str] = &["date", "ds", "x", "timestamp", "time", "t"];
const PRICE_KEYS: &[&str] = &["price", "y", "value", "amount"];
const MAX_JSON_DEPTH: usize = 12;

lazy_static! {
    static ref CHART_CATEGORIES: Regex =
        Regex::new(r#""?categories"?\s*:\s*(\[[^\]]*\])"#).unwrap();
    static ref CHART_DATA_FLAT: Regex = Regex::new(r#""?data"?\s*:\s*(\[[^\[\]]*\])"#).unwrap();
    static ref CHART_DATA_PAIRS: Regex =
        Regex::new(r#"(?s)"?data"?\s*:\s*(\[\s*\[.*?\]\s*\])"#).unwrap();
}

#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HarvesterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("HISTORY_SITE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.base_url),
            timeout: std::env::var("HARVESTER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            user_agent: std::env::var("HARVESTER_USER_AGENT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.user_agent),
        }
    }
}

pub struct ExternalHarvester {
    client: reqwest::Client,
    base_url: String,
}

impl ExternalHarvester {
    pub fn new(config: HarvesterConfig) -> PriceWatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| PriceWatchError::Config(format!("harvester http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_page(&self, url: &str, query: Option<&str>) -> PriceWatchResult<String> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.5");
        if let Some(q) = query {
            request = request.query(&[("q", q)]);
        }

        let response = request.send().await.map_err(PriceWatchError::lookup)?;
        if !response.status().is_success() {
            return Err(PriceWatchError::Lookup(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }
        response.text().await.map_err(PriceWatchError::lookup)
    }

    /// Search the tracker for the product, open its page, read the chart.
    pub async fn harvest(&self, product_url: &str) -> PriceWatchResult<PriceHistory> {
        let query = product_identifier(product_url).unwrap_or_else(|| product_url.to_string());
        tracing::info!("Harvester: searching tracker for {}", query);

        let search_html = self
            .fetch_page(&format!("{}/search", self.base_url), Some(&query))
            .await?;

        let Some(path) = find_product_link(&search_html) else {
            tracing::info!("Harvester: no product found on tracker site");
            return Ok(PriceHistory::empty());
        };

        let page_url = format!("{}{}", self.base_url, path);
        tracing::debug!("Harvester: fetching {}", page_url);
        let product_html = self.fetch_page(&page_url, None).await?;

        match extract_series(&product_html) {
            Some(points) => {
                tracing::info!("Harvester: recovered {} points", points.len());
                Ok(PriceHistory::from_points(points))
            }
            None => {
                tracing::info!("Harvester: page reached but no readable chart series");
                Ok(PriceHistory::empty())
            }
        }
    }
}

#[async_trait]
impl HistorySource for ExternalHarvester {
    fn label(&self) -> DataSource {
        DataSource::ExternalScraper
    }

    async fn resolve_history(&self, product_url: &str, _current_price: f64) -> PriceHistory {
        match self.harvest(product_url).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("Harvester failed for {}: {}", product_url, e);
                PriceHistory::empty()
            }
        }
    }
}

/// First link on a search page that points at a product page.
pub(crate) fn find_product_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"a[href^="/product/"]"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Read a price series out of embedded page data. Structured `__NEXT_DATA__`
/// JSON is preferred over inline chart configuration.
pub(crate) fn extract_series(html: &str) -> Option<Vec<PricePoint>> {
    let document = Html::parse_document(html);

    if let Ok(next_data) = Selector::parse("script#__NEXT_DATA__") {
        for script in document.select(&next_data) {
            let text: String = script.text().collect();
            if let Ok(json) = serde_json::from_str::<Value>(&text) {
                if let Some(points) = series_from_json(&json, 0) {
                    return Some(points);
                }
            }
        }
    }

    let scripts = Selector::parse("script").ok()?;
    for script in document.select(&scripts) {
        let text: String = script.text().collect();
        if !(text.contains("Highcharts") || text.contains("Chart")) {
            continue;
        }
        if let Some(points) = series_from_chart_config(&text) {
            return Some(points);
        }
    }

    None
}

fn series_from_json(value: &Value, depth: usize) -> Option<Vec<PricePoint>> {
    if depth > MAX_JSON_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            for key in HISTORY_KEYS {
                if let Some(Value::Array(items)) = map.get(*key) {
                    if let Some(points) = points_from_array(items) {
                        return Some(points);
                    }
                }
            }
            map.values().find_map(|v| series_from_json(v, depth + 1))
        }
        Value::Array(items) => items.iter().find_map(|v| series_from_json(v, depth + 1)),
        _ => None,
    }
}

/// All-or-nothing: one unreadable entry rejects the whole array.
fn points_from_array(items: &[Value]) -> Option<Vec<PricePoint>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => {
                let ts = DATE_KEYS.iter().find_map(|k| obj.get(*k)).and_then(parse_timestamp)?;
                let price = PRICE_KEYS.iter().find_map(|k| obj.get(*k)).and_then(parse_price)?;
                Some(PricePoint::new(ts, price))
            }
            Value::Array(pair) if pair.len() == 2 => {
                Some(PricePoint::new(parse_timestamp(&pair[0])?, parse_price(&pair[1])?))
            }
            _ => None,
        })
        .collect()
}

fn series_from_chart_config(script: &str) -> Option<Vec<PricePoint>> {
    if let Some(pairs) = CHART_DATA_PAIRS.captures(script) {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&pairs[1]) {
            if let Some(points) = points_from_array(&items) {
                return Some(points);
            }
        }
    }

    let categories = CHART_CATEGORIES.captures(script)?;
    let data = CHART_DATA_FLAT.captures(script)?;
    let dates: Vec<Value> = serde_json::from_str(&categories[1]).ok()?;
    let prices: Vec<Value> = serde_json::from_str(&data[1]).ok()?;
    if dates.is_empty() || dates.len() != prices.len() {
        return None;
    }

    dates
        .iter()
        .zip(prices.iter())
        .map(|(d, p)| Some(PricePoint::new(parse_timestamp(d)?, parse_price(p)?)))
        .collect()
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    // Charting libraries use milliseconds; anything that large is not seconds.
    let millis = if raw > 1e11 { raw } else { raw * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    for fmt in ["%Y-%m-%d", "%d %b %Y", "%b %d, %Y", "%d-%m-%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
        }
    }
    s.parse::<f64>().ok().and_then(from_epoch)
}

fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            cleaned.parse().ok()?
        }
        _ => return None,
    };
    (price.is_finite() && price > 0.0).then_some(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_product_link() {
        let html = r#"<html><body>
            <a href="/about">About</a>
            <a class="card-link" href="/product/apple-iphone-15-b0chx1w1xy">iPhone 15</a>
            <a href="/product/other">Other</a>
        </body></html>"#;
        assert_eq!(
            find_product_link(html),
            Some("/product/apple-iphone-15-b0chx1w1xy".to_string())
        );
        assert_eq!(find_product_link("<html><a href='/search'>x</a></html>"), None);
    }

    #[test]
    fn test_extract_from_next_data() {
        let html = r#"<html><head>
            <script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"product":{"title":"iPhone","priceHistory":[
                {"date":"2024-05-01","price":71999},
                {"date":"2024-05-02","price":"₹70,499"},
                {"date":"2024-05-03","price":69999.5}
            ]}}}}
            </script></head><body></body></html>"#;

        let points = extract_series(html).unwrap();
        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![71999.0, 70499.0, 69999.5]);
        assert_eq!(points[0].timestamp.format("%Y-%m-%d").to_string(), "2024-05-01");
    }

    #[test]
    fn test_extract_from_chart_categories() {
        let html = r#"<script>
            Highcharts.chart('container', {"xAxis":{"categories":["2024-01-01","2024-01-02","2024-01-03"]},
            "series":[{"name":"Price","data":[500,480,495]}]});
        </script>"#;

        let points = extract_series(html).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].price, 480.0);
    }

    #[test]
    fn test_extract_from_chart_pairs() {
        let html = r#"<script>
            new Chart(ctx, {"series":[{"data":[[1714521600000, 1299],[1714608000000, 1249]]}]});
        </script>"#;

        let points = extract_series(html).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp.format("%Y-%m-%d").to_string(), "2024-05-01");
    }

    #[test]
    fn test_mismatched_chart_arrays_are_rejected() {
        let html = r#"<script>
            Highcharts.chart('c', {"categories":["2024-01-01","2024-01-02"],"data":[500]});
        </script>"#;
        assert!(extract_series(html).is_none());
    }

    #[test]
    fn test_one_bad_entry_rejects_series() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"priceHistory":[
                {"date":"2024-05-01","price":100},
                {"date":"sometime","price":90}
            ]}}}
        </script>"#;
        assert!(extract_series(html).is_none());
    }

    #[test]
    fn test_protected_page_yields_nothing() {
        let html = r#"<html><body><div class="price">Lowest: ₹65,999</div>
            <script>window.__chart = loadProtectedChart();</script></body></html>"#;
        assert!(extract_series(html).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_site_degrades_to_empty() {
        let harvester = ExternalHarvester::new(HarvesterConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            user_agent: "test".to_string(),
        })
        .unwrap();
        let history = harvester
            .resolve_history("https://www.amazon.in/dp/B0CHX1W1XY", 100.0)
            .await;
        assert!(history.is_empty());
    }
}
