use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single observed price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Append-only, timestamp-ordered price series for one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    points: Vec<PricePoint>,
}

impl PriceHistory {
    /// A history with no points.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from unordered points. Sorting is stable so equal timestamps keep
    /// their insertion order.
    pub fn from_points(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    /// Points in ascending timestamp order.
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent point.
    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Append a newer observation. Points older than the tail are rejected so
    /// the series never needs re-sorting.
    pub fn append(&mut self, point: PricePoint) -> bool {
        if let Some(last) = self.points.last() {
            if point.timestamp < last.timestamp {
                return false;
            }
        }
        self.points.push(point);
        true
    }

    /// Arithmetic mean of all prices, `None` when empty.
    pub fn mean_price(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|p| p.price).sum::<f64>() / self.points.len() as f64)
    }
}

/// A tracked marketplace product, keyed by canonical URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    pub image_url: Option<String>,
    pub latest_price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One scrape result to be folded into Product + PriceHistory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductObservation {
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    pub image_url: Option<String>,
    pub price: f64,
}

/// A user's "tell me when it drops below X" watch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub user: String,
    pub product_title: String,
    pub target_price: f64,
    pub current_price: Option<f64>,
    pub product_image: Option<String>,
    pub product_link: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlert {
    pub user: String,
    pub product_title: String,
    pub target_price: f64,
    pub current_price: Option<f64>,
    pub product_image: Option<String>,
    pub product_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PriceDrop,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PriceDrop => "price_drop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "price_drop" => Some(NotificationKind::PriceDrop),
            _ => None,
        }
    }
}

/// A user-facing notification. Immutable after creation apart from `is_read`,
/// which belongs to the request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user: String,
    pub alert_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub product_title: String,
    pub old_price: f64,
    pub new_price: f64,
    pub product_image: Option<String>,
    pub product_link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A news headline as returned by the feed boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub published: Option<DateTime<Utc>>,
}

/// Direction implied by recent news for a product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentSignal {
    Inflationary,
    Deflationary,
    Neutral,
    Error,
}

impl SentimentSignal {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s > 0 => SentimentSignal::Inflationary,
            s if s < 0 => SentimentSignal::Deflationary,
            _ => SentimentSignal::Neutral,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SentimentSignal::Inflationary => "Inflationary",
            SentimentSignal::Deflationary => "Deflationary",
            SentimentSignal::Neutral => "Neutral",
            SentimentSignal::Error => "Error",
        }
    }
}

impl fmt::Display for SentimentSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub score: i32,
    pub signal: SentimentSignal,
    pub query: Option<String>,
    pub relevant_headlines: usize,
    /// At most two headlines that moved the score.
    pub top_news: Vec<String>,
    pub summary: Option<String>,
}

impl SentimentResult {
    pub fn error() -> Self {
        Self {
            score: 0,
            signal: SentimentSignal::Error,
            query: None,
            relevant_headlines: 0,
            top_news: Vec::new(),
            summary: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Rising,
    Stable,
    Dropping,
    Unknown,
    Error,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Rising => "Rising",
            Trend::Stable => "Stable",
            Trend::Dropping => "Dropping",
            Trend::Unknown => "Unknown",
            Trend::Error => "Error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Buy Now")]
    BuyNow,
    Wait,
    #[serde(rename = "Data Collection Started")]
    DataCollectionStarted,
    Error,
}

impl Recommendation {
    pub fn for_trend(trend: Trend) -> Self {
        match trend {
            Trend::Rising | Trend::Stable => Recommendation::BuyNow,
            Trend::Dropping => Recommendation::Wait,
            Trend::Unknown => Recommendation::DataCollectionStarted,
            Trend::Error => Recommendation::Error,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::BuyNow => "Buy Now",
            Recommendation::Wait => "Wait",
            Recommendation::DataCollectionStarted => "Data Collection Started",
            Recommendation::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Provenance of the history a forecast was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    #[serde(rename = "Price History DB")]
    PersistedHistory,
    #[serde(rename = "External Scraper (Live)")]
    ExternalScraper,
    Synthetic,
    #[serde(rename = "Insufficient History")]
    InsufficientHistory,
    Error,
}

impl DataSource {
    pub fn label(&self) -> &'static str {
        match self {
            DataSource::PersistedHistory => "Price History DB",
            DataSource::ExternalScraper => "External Scraper (Live)",
            DataSource::Synthetic => "Synthetic",
            DataSource::InsufficientHistory => "Insufficient History",
            DataSource::Error => "Error",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a forecast caller always gets back, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub current_price: f64,
    pub trend: Trend,
    pub forecast: Vec<ForecastPoint>,
    pub recommendation: Recommendation,
    pub data_source: DataSource,
    #[serde(default)]
    pub news_context: Option<SentimentResult>,
}

impl ForecastResult {
    pub fn insufficient(current_price: f64) -> Self {
        Self {
            product_name: None,
            current_price,
            trend: Trend::Unknown,
            forecast: Vec::new(),
            recommendation: Recommendation::DataCollectionStarted,
            data_source: DataSource::InsufficientHistory,
            news_context: None,
        }
    }

    pub fn error(current_price: f64) -> Self {
        Self {
            product_name: None,
            current_price,
            trend: Trend::Error,
            forecast: Vec::new(),
            recommendation: Recommendation::Error,
            data_source: DataSource::Error,
            news_context: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_history_from_points_sorts_by_timestamp() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let history = PriceHistory::from_points(vec![
            PricePoint::new(t0 + Duration::days(2), 3.0),
            PricePoint::new(t0, 1.0),
            PricePoint::new(t0 + Duration::days(1), 2.0),
        ]);
        let prices: Vec<f64> = history.points().iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
        assert_eq!(history.mean_price(), Some(2.0));
    }

    #[test]
    fn test_history_append_rejects_older_points() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut history = PriceHistory::empty();
        assert!(history.append(PricePoint::new(t0, 10.0)));
        assert!(history.append(PricePoint::new(t0, 11.0)));
        assert!(!history.append(PricePoint::new(t0 - Duration::hours(1), 9.0)));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_recommendation_follows_trend() {
        assert_eq!(Recommendation::for_trend(Trend::Rising), Recommendation::BuyNow);
        assert_eq!(Recommendation::for_trend(Trend::Stable), Recommendation::BuyNow);
        assert_eq!(Recommendation::for_trend(Trend::Dropping), Recommendation::Wait);
    }

    #[test]
    fn test_labels_serialize_as_display_strings() {
        let json = serde_json::to_string(&Recommendation::BuyNow).unwrap();
        assert_eq!(json, "\"Buy Now\"");
        let json = serde_json::to_string(&DataSource::InsufficientHistory).unwrap();
        assert_eq!(json, "\"Insufficient History\"");
        let json = serde_json::to_string(&NotificationKind::PriceDrop).unwrap();
        assert_eq!(json, "\"price_drop\"");
        assert_eq!(SentimentSignal::from_score(3).label(), "Inflationary (Prices Rising)");
        assert_eq!(SentimentSignal::from_score(0), SentimentSignal::Neutral);
    }

    #[test]
    fn test_sentiment_signal_labels() {
        assert_eq!(SentimentSignal::from_score(3).to_string(), "Inflationary");
        assert_eq!(SentimentSignal::from_score(-1).to_string(), "Deflationary");
        let json = serde_json::to_string(&SentimentSignal::Deflationary).unwrap();
        assert_eq!(json, "\"Deflationary\"");
        let back: SentimentSignal = serde_json::from_str("\"Inflationary\"").unwrap();
        assert_eq!(back, SentimentSignal::Inflationary);
    }
}
