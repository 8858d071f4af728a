//! Marketplace product identifiers and URL cleanup.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;

lazy_static! {
    static ref AMAZON_ASIN: Regex = Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})").unwrap();
    static ref FLIPKART_PID: Regex = Regex::new(r"pid=([A-Z0-9]{10,})").unwrap();
}

const TRACKING_PARAMS: &[&str] = &[
    "ref", "ref_", "qid", "sr", "keywords", "dib", "dib_tag", "crid", "sprefix", "psc", "smid",
    "linkCode", "tag", "ascsubtag", "pf_rd_r", "pf_rd_p", "pd_rd_r", "pd_rd_w", "pd_rd_wg",
    "clnoe",
];

/// Amazon ASIN from a `/dp/` or `/gp/product/` path.
pub fn extract_asin(url: &str) -> Option<String> {
    AMAZON_ASIN.captures(url).map(|c| c[1].to_string())
}

pub fn extract_flipkart_pid(url: &str) -> Option<String> {
    if !url.contains("flipkart") {
        return None;
    }
    FLIPKART_PID.captures(url).map(|c| c[1].to_string())
}

/// The marketplace identifier for this URL, if it has one we recognise.
pub fn product_identifier(url: &str) -> Option<String> {
    extract_asin(url).or_else(|| extract_flipkart_pid(url))
}

/// Canonical form used as the unique key for a product.
///
/// Amazon links collapse to `https://{host}/dp/{ASIN}`, Flipkart links keep
/// their path plus `pid`, anything else loses known tracking parameters.
/// Unparseable input is returned trimmed.
pub fn canonical_product_url(raw: &str) -> String {
    let raw = raw.trim();
    let parsed = Url::parse(raw).ok();

    if raw.contains("amazon") || raw.contains("amzn") {
        if let Some(asin) = extract_asin(raw) {
            let host = parsed
                .as_ref()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| "www.amazon.in".to_string());
            return format!("https://{host}/dp/{asin}");
        }
    }

    if let Some(pid) = extract_flipkart_pid(raw) {
        let host = parsed
            .as_ref()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "www.flipkart.com".to_string());
        let path = parsed
            .as_ref()
            .map(|u| u.path().to_string())
            .filter(|p| p.contains("/p/"))
            .unwrap_or_else(|| "/product/p/itme".to_string());
        return format!("https://{host}{path}?pid={pid}");
    }

    let Some(mut url) = parsed else {
        return raw.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_asin_from_dp_and_gp_paths() {
        assert_eq!(
            extract_asin("https://www.amazon.in/Apple-iPhone-15/dp/B0CHX1W1XY/ref=sr_1_1"),
            Some("B0CHX1W1XY".to_string())
        );
        assert_eq!(
            extract_asin("https://www.amazon.com/gp/product/B08N5WRWNW?psc=1"),
            Some("B08N5WRWNW".to_string())
        );
        assert_eq!(extract_asin("https://www.amazon.in/s?k=iphone"), None);
    }

    #[test]
    fn test_product_identifier_falls_back_to_flipkart() {
        let url = "https://www.flipkart.com/apple-iphone-15/p/itm6ac6485515ae4?pid=MOBGTAGPTB3VS24W&lid=x";
        assert_eq!(product_identifier(url), Some("MOBGTAGPTB3VS24W".to_string()));
        assert_eq!(product_identifier("https://example.com/item/42"), None);
    }

    #[test]
    fn test_canonical_amazon_url() {
        assert_eq!(
            canonical_product_url("https://www.amazon.in/Apple-iPhone/dp/B0CHX1W1XY/ref=sr_1_1?keywords=iphone&qid=1"),
            "https://www.amazon.in/dp/B0CHX1W1XY"
        );
    }

    #[test]
    fn test_canonical_flipkart_url() {
        assert_eq!(
            canonical_product_url("https://www.flipkart.com/apple-iphone-15/p/itm6ac6485515ae4?pid=MOBGTAGPTB3VS24W&lid=LST"),
            "https://www.flipkart.com/apple-iphone-15/p/itm6ac6485515ae4?pid=MOBGTAGPTB3VS24W"
        );
    }

    #[test]
    fn test_canonical_strips_tracking_params_only() {
        assert_eq!(
            canonical_product_url("https://shop.example.com/item?id=7&tag=aff-21&ref=home#reviews"),
            "https://shop.example.com/item?id=7"
        );
        assert_eq!(canonical_product_url("not a url "), "not a url");
    }
}
