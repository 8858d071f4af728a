use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Alert, DataSource, Headline, NewAlert, Notification, PriceHistory, PriceWatchResult, Product,
    ProductObservation,
};

/// One strategy for obtaining a price series.
///
/// Implementations never fail: any internal error is logged and surfaces as an
/// empty history so the cascade can move on to the next strategy.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Provenance tag attached to forecasts trained on this source.
    fn label(&self) -> DataSource;

    async fn resolve_history(&self, product_url: &str, current_price: f64) -> PriceHistory;
}

/// Text-search news feed returning most-recent-first headlines.
#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn headlines(&self, query: &str, limit: usize) -> PriceWatchResult<Vec<Headline>>;
}

/// "Find the current price of this product." A non-positive price means the
/// lookup found nothing.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn current_price(
        &self,
        product_title: &str,
        product_link: Option<&str>,
    ) -> PriceWatchResult<f64>;
}

/// Persistence boundary for Product and PriceHistory.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Upsert the product by URL, refresh `latest_price`, append a PricePoint.
    async fn track_observation(&self, observation: &ProductObservation) -> PriceWatchResult<i64>;

    async fn product_by_url(&self, url: &str) -> PriceWatchResult<Option<Product>>;

    /// Full ascending history for the product with exactly this URL.
    async fn price_history(&self, url: &str) -> PriceWatchResult<PriceHistory>;
}

/// Persistence boundary for Alert and Notification.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Snapshot of every alert with `is_active = true`.
    async fn active_alerts(&self) -> PriceWatchResult<Vec<Alert>>;

    async fn update_alert_price(
        &self,
        alert_id: &str,
        new_price: f64,
        at: DateTime<Utc>,
    ) -> PriceWatchResult<()>;

    async fn create_alert(&self, alert: &NewAlert) -> PriceWatchResult<Alert>;

    /// Insert `notification` unless one of the same kind already exists for the
    /// same `(user, alert_id)` created at or after `since`. Check and insert are
    /// one statement. Returns whether a row was written.
    async fn insert_notification_unless_recent(
        &self,
        notification: &Notification,
        since: DateTime<Utc>,
    ) -> PriceWatchResult<bool>;

    async fn recent_notifications(
        &self,
        user: &str,
        limit: i64,
    ) -> PriceWatchResult<Vec<Notification>>;
}
