//! Directional price sentiment from recent news headlines.
//!
//! A product name is mapped to a category query, the feed is asked for the
//! most recent headlines, and each headline votes +1 (prices rising), -1
//! (prices falling) or 0 by keyword.

pub mod analyzer;
pub mod feed;

pub use analyzer::{category_query, score_headline, SentimentAnalyzer, HEADLINE_LIMIT};
pub use feed::{GoogleNewsFeed, NewsConfig};
