use pricewatch_core::{NewsFeed, SentimentResult, SentimentSignal};
use std::sync::Arc;

/// Headlines inspected per query.
pub const HEADLINE_LIMIT: usize = 10;
const TOP_NEWS: usize = 2;

const INFLATIONARY: &[&str] = &[
    "hike", "surge", "jump", "soar", "increase", "shortage", "crisis", "expensive", "inflation",
    "climb",
];

const DEFLATIONARY: &[&str] = &[
    "drop", "fall", "plunge", "slash", "cut", "cheaper", "discount", "surplus", "glut", "low",
    "down",
];

/// Category terms checked in priority order; first match wins.
const CATEGORIES: &[(&[&str], &str)] = &[
    (&["ram", "memory"], "DRAM price trend"),
    (&["ssd", "storage"], "NAND flash price trend"),
    (&["processor", "cpu", "intel", "amd"], "CPU price forecast"),
    (&["card", "gpu", "rtx"], "GPU price trend"),
];

/// Map a product name to the news query for its component category.
///
/// Matching is case-insensitive substring, so "Intel Core i7" and
/// "AMD Ryzen" both land on the CPU query.
pub fn category_query(product_name: &str) -> String {
    let lower = product_name.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(terms, _)| terms.iter().any(|t| lower.contains(t)))
        .map(|(_, query)| query.to_string())
        .unwrap_or_else(|| format!("{product_name} price"))
}

/// +1 for any inflationary keyword, -1 for any deflationary keyword. A title
/// carrying both nets to zero.
pub fn score_headline(title: &str) -> i32 {
    let lower = title.to_lowercase();
    let mut score = 0;
    if INFLATIONARY.iter().any(|w| lower.contains(w)) {
        score += 1;
    }
    if DEFLATIONARY.iter().any(|w| lower.contains(w)) {
        score -= 1;
    }
    score
}

pub struct SentimentAnalyzer {
    feed: Arc<dyn NewsFeed>,
}

impl SentimentAnalyzer {
    pub fn new(feed: Arc<dyn NewsFeed>) -> Self {
        Self { feed }
    }

    /// Never fails: feed errors come back as a zero-score `Error` result.
    pub async fn sentiment(&self, product_name: &str) -> SentimentResult {
        let query = category_query(product_name);
        tracing::info!("News sentiment: checking '{}'", query);

        let headlines = match self.feed.headlines(&query, HEADLINE_LIMIT).await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!("News feed failed for '{}': {}", query, e);
                return SentimentResult {
                    query: Some(query),
                    ..SentimentResult::error()
                };
            }
        };

        if headlines.is_empty() {
            return SentimentResult {
                score: 0,
                signal: SentimentSignal::Neutral,
                query: Some(query),
                relevant_headlines: 0,
                top_news: Vec::new(),
                summary: Some("No specific news found".to_string()),
            };
        }

        let mut score = 0;
        let mut relevant = Vec::new();
        for headline in headlines.iter().take(HEADLINE_LIMIT) {
            let contribution = score_headline(&headline.title);
            if contribution != 0 {
                score += contribution;
                relevant.push(headline.title.clone());
            }
        }

        tracing::info!(
            score,
            relevant = relevant.len(),
            "News sentiment computed for '{}'",
            query
        );

        let relevant_headlines = relevant.len();
        relevant.truncate(TOP_NEWS);
        SentimentResult {
            score,
            signal: SentimentSignal::from_score(score),
            query: Some(query),
            relevant_headlines,
            top_news: relevant,
            summary: None,
        }
    }
}
