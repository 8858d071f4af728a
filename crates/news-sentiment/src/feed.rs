use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricewatch_core::{Headline, NewsFeed, PriceWatchError, PriceWatchResult};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_FEED_URL: &str = "https://news.google.com/rss/search";
const RECENCY_WINDOW: &str = "when:30d";

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub feed_url: String,
    pub timeout: Duration,
    /// Locale parameters appended to every search.
    pub locale: Vec<(String, String)>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            timeout: Duration::from_secs(10),
            locale: vec![
                ("hl".to_string(), "en-IN".to_string()),
                ("gl".to_string(), "IN".to_string()),
                ("ceid".to_string(), "IN:en".to_string()),
            ],
        }
    }
}

impl NewsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            feed_url: std::env::var("NEWS_FEED_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.feed_url),
            timeout: std::env::var("NEWS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            locale: defaults.locale,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
}

/// Parse an RSS 2.0 document into at most `limit` headlines, in feed order.
pub fn parse_rss(body: &str, limit: usize) -> PriceWatchResult<Vec<Headline>> {
    let rss: Rss = quick_xml::de::from_str(body)
        .map_err(|e| PriceWatchError::Transport(format!("malformed news feed: {e}")))?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .filter(|item| !item.title.trim().is_empty())
        .take(limit)
        .map(|item| Headline {
            title: item.title,
            published: item
                .pub_date
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc2822(s.trim()).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
        .collect())
}

/// Google News RSS search restricted to the last 30 days.
pub struct GoogleNewsFeed {
    client: reqwest::Client,
    config: NewsConfig,
}

impl GoogleNewsFeed {
    pub fn new(config: NewsConfig) -> PriceWatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PriceWatchError::Config(format!("news http client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl NewsFeed for GoogleNewsFeed {
    async fn headlines(&self, query: &str, limit: usize) -> PriceWatchResult<Vec<Headline>> {
        let mut params = vec![("q".to_string(), format!("{query} {RECENCY_WINDOW}"))];
        params.extend(self.config.locale.iter().cloned());

        let response = self
            .client
            .get(&self.config.feed_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PriceWatchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceWatchError::Transport(format!(
                "news feed returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PriceWatchError::Transport(e.to_string()))?;
        parse_rss(&body, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <generator>NFE/5.0</generator>
    <title>"DRAM price trend when:30d" - Google News</title>
    <link>https://news.google.com/search?q=DRAM</link>
    <item>
      <title>DRAM contract prices surge as AI demand soaks up supply - TrendForce</title>
      <link>https://news.google.com/articles/1</link>
      <pubDate>Mon, 06 Oct 2025 08:00:00 GMT</pubDate>
      <source url="https://www.trendforce.com">TrendForce</source>
    </item>
    <item>
      <title>Memory makers slash output</title>
      <pubDate>not a date</pubDate>
    </item>
    <item>
      <title>Third headline</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss_reads_titles_and_dates() {
        let headlines = parse_rss(SAMPLE, 10).unwrap();
        assert_eq!(headlines.len(), 3);
        assert!(headlines[0].title.starts_with("DRAM contract prices surge"));
        assert!(headlines[0].published.is_some());
        assert!(headlines[1].published.is_none());
    }

    #[test]
    fn test_parse_rss_respects_limit() {
        assert_eq!(parse_rss(SAMPLE, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rss_empty_channel() {
        let body = r#"<rss version="2.0"><channel><title>nothing</title></channel></rss>"#;
        assert!(parse_rss(body, 10).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rss_rejects_garbage() {
        assert!(parse_rss("<html><body>blocked</body></html>", 10).is_err());
    }
}
