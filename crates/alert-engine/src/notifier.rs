use chrono::{Duration, Utc};
use pricewatch_core::{Alert, AlertStore, Notification, NotificationKind, PriceWatchResult};
use std::sync::Arc;
use uuid::Uuid;

pub const DEDUP_WINDOW_HOURS: i64 = 24;
pub const PRICE_DROP_TITLE: &str = "Price Drop Alert!";

/// Everything a price-drop notification needs to say.
#[derive(Debug, Clone, PartialEq)]
pub struct DropNotice {
    pub alert_id: String,
    pub user: String,
    pub product_title: String,
    pub old_price: f64,
    pub new_price: f64,
    pub product_image: Option<String>,
    pub product_link: Option<String>,
}

impl DropNotice {
    /// `old_price` is whatever baseline the caller wants the user to see.
    pub fn for_alert(alert: &Alert, old_price: f64, new_price: f64) -> Self {
        Self {
            alert_id: alert.id.clone(),
            user: alert.user.clone(),
            product_title: alert.product_title.clone(),
            old_price,
            new_price,
            product_image: alert.product_image.clone(),
            product_link: alert.product_link.clone(),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Great news! {} is now ₹{:.0} (was ₹{:.0})",
            self.product_title, self.new_price, self.old_price
        )
    }
}

/// Writes price-drop notifications, at most one per (user, alert) per window.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn AlertStore>,
    window: Duration,
}

impl Notifier {
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        Self::with_window(store, Duration::hours(DEDUP_WINDOW_HOURS))
    }

    pub fn with_window(store: Arc<dyn AlertStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Returns whether a notification was written. A suppressed duplicate is
    /// `Ok(false)`, not an error.
    pub async fn notify(&self, notice: &DropNotice) -> PriceWatchResult<bool> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user: notice.user.clone(),
            alert_id: notice.alert_id.clone(),
            kind: NotificationKind::PriceDrop,
            title: PRICE_DROP_TITLE.to_string(),
            message: notice.message(),
            product_title: notice.product_title.clone(),
            old_price: notice.old_price,
            new_price: notice.new_price,
            product_image: notice.product_image.clone(),
            product_link: notice.product_link.clone(),
            is_read: false,
            created_at: now,
        };

        let created = self
            .store
            .insert_notification_unless_recent(&notification, now - self.window)
            .await?;

        if created {
            tracing::info!(
                alert_id = %notice.alert_id,
                user = %notice.user,
                "Created price drop notification for {}",
                notice.product_title
            );
        } else {
            tracing::info!(
                alert_id = %notice.alert_id,
                user = %notice.user,
                "Price drop already notified within {}h, skipping",
                self.window.num_hours()
            );
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use price_store::{AlertManager, PriceDb};
    use pricewatch_core::NewAlert;

    async fn setup() -> (Arc<AlertManager>, Alert) {
        let manager = Arc::new(AlertManager::new(PriceDb::new("sqlite::memory:").await.unwrap()));
        let alert = manager
            .create(&NewAlert {
                user: "priya@example.com".to_string(),
                product_title: "Boat Rockerz 255 Pro+".to_string(),
                target_price: 277.0,
                current_price: Some(299.0),
                product_image: Some("https://m.media-amazon.com/images/I/boat.jpg".to_string()),
                product_link: Some("https://www.amazon.in/dp/B08TV2P1N8".to_string()),
            })
            .await
            .unwrap();
        (manager, alert)
    }

    #[test]
    fn test_message_rounds_prices() {
        let notice = DropNotice {
            alert_id: "a".into(),
            user: "u".into(),
            product_title: "Boat Rockerz 255".into(),
            old_price: 277.0,
            new_price: 249.6,
            product_image: None,
            product_link: None,
        };
        assert_eq!(notice.message(), "Great news! Boat Rockerz 255 is now ₹250 (was ₹277)");
    }

    #[tokio::test]
    async fn test_second_notify_within_window_is_suppressed() {
        let (manager, alert) = setup().await;
        let notifier = Notifier::new(manager.clone());
        let notice = DropNotice::for_alert(&alert, alert.target_price, 250.0);

        assert!(notifier.notify(&notice).await.unwrap());
        assert!(!notifier.notify(&notice).await.unwrap());

        let stored = manager.notifications_for(&alert.user, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, PRICE_DROP_TITLE);
        assert_eq!(stored[0].old_price, 277.0);
        assert_eq!(stored[0].new_price, 250.0);
        assert_eq!(stored[0].product_link, alert.product_link);
        assert!(!stored[0].is_read);
    }

    #[tokio::test]
    async fn test_zero_window_never_suppresses_later_notices() {
        let (manager, alert) = setup().await;
        let notifier = Notifier::with_window(manager.clone(), Duration::zero());
        let notice = DropNotice::for_alert(&alert, 277.0, 250.0);

        assert!(notifier.notify(&notice).await.unwrap());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(notifier.notify(&notice).await.unwrap());
        assert_eq!(manager.notifications_for(&alert.user, 10).await.unwrap().len(), 2);
    }
}
