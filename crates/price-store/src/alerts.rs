use crate::db::{decode_ts, encode_ts, PriceDb};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricewatch_core::{
    Alert, AlertStore, NewAlert, Notification, NotificationKind, PriceWatchError,
    PriceWatchResult,
};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: String,
    user_email: String,
    product_title: String,
    target_price: f64,
    current_price: Option<f64>,
    product_image: Option<String>,
    product_link: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AlertRow> for Alert {
    type Error = anyhow::Error;

    fn try_from(row: AlertRow) -> Result<Self> {
        Ok(Alert {
            id: row.id,
            user: row.user_email,
            product_title: row.product_title,
            target_price: row.target_price,
            current_price: row.current_price,
            product_image: row.product_image,
            product_link: row.product_link,
            is_active: row.is_active,
            created_at: decode_ts(&row.created_at)?,
            updated_at: decode_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    user_email: String,
    alert_id: String,
    kind: String,
    title: String,
    message: String,
    product_title: String,
    old_price: f64,
    new_price: f64,
    product_image: Option<String>,
    product_link: Option<String>,
    is_read: bool,
    created_at: String,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = anyhow::Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        let kind = NotificationKind::parse(&row.kind)
            .ok_or_else(|| anyhow!("unknown notification kind: {}", row.kind))?;
        Ok(Notification {
            id: row.id,
            user: row.user_email,
            alert_id: row.alert_id,
            kind,
            title: row.title,
            message: row.message,
            product_title: row.product_title,
            old_price: row.old_price,
            new_price: row.new_price,
            product_image: row.product_image,
            product_link: row.product_link,
            is_read: row.is_read,
            created_at: decode_ts(&row.created_at)?,
        })
    }
}

/// Alerts and the notifications they produce.
#[derive(Clone)]
pub struct AlertManager {
    db: PriceDb,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(db: PriceDb) -> Self {
        Self { db }
    }

    /// Insert an active alert and return it as stored
    pub async fn create(&self, alert: &NewAlert) -> Result<Alert> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO alerts
            (id, user_email, product_title, target_price, current_price, product_image, product_link, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&alert.user)
        .bind(&alert.product_title)
        .bind(alert.target_price)
        .bind(alert.current_price)
        .bind(&alert.product_image)
        .bind(&alert.product_link)
        .bind(encode_ts(now))
        .bind(encode_ts(now))
        .execute(self.db.pool())
        .await?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow!("alert {id} vanished after insert"))
    }

    /// Get an alert by id
    pub async fn get(&self, id: &str) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>("SELECT * FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        row.map(Alert::try_from).transpose()
    }

    /// Active alerts, newest first.
    pub async fn get_active(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM alerts WHERE is_active = 1 ORDER BY created_at DESC, id ASC",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Alert::try_from).collect()
    }

    /// Record a freshly looked-up price; errors if the alert does not exist
    pub async fn update_price(&self, id: &str, new_price: f64, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE alerts SET current_price = ?, updated_at = ? WHERE id = ?")
            .bind(new_price)
            .bind(encode_ts(at))
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("alert not found: {id}"));
        }
        Ok(())
    }

    /// Stop evaluating an alert
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE alerts SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(encode_ts(Utc::now()))
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Conditional insert: the dedup check and the write are one statement, so
    /// two evaluators racing on the same alert still produce a single row.
    pub async fn insert_notification_if_absent(
        &self,
        n: &Notification,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications
            (id, user_email, alert_id, kind, title, message, product_title, old_price, new_price,
             product_image, product_link, is_read, created_at)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM notifications
                WHERE user_email = ? AND alert_id = ? AND kind = ? AND created_at >= ?
            )
            "#,
        )
        .bind(&n.id)
        .bind(&n.user)
        .bind(&n.alert_id)
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.product_title)
        .bind(n.old_price)
        .bind(n.new_price)
        .bind(&n.product_image)
        .bind(&n.product_link)
        .bind(n.is_read)
        .bind(encode_ts(n.created_at))
        .bind(&n.user)
        .bind(&n.alert_id)
        .bind(n.kind.as_str())
        .bind(encode_ts(since))
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Most recent notifications for a user, newest first
    pub async fn notifications_for(&self, user: &str, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications WHERE user_email = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }
}

#[async_trait]
impl AlertStore for AlertManager {
    async fn active_alerts(&self) -> PriceWatchResult<Vec<Alert>> {
        self.get_active().await.map_err(PriceWatchError::persistence)
    }

    async fn update_alert_price(
        &self,
        alert_id: &str,
        new_price: f64,
        at: DateTime<Utc>,
    ) -> PriceWatchResult<()> {
        self.update_price(alert_id, new_price, at)
            .await
            .map_err(PriceWatchError::persistence)
    }

    async fn create_alert(&self, alert: &NewAlert) -> PriceWatchResult<Alert> {
        self.create(alert).await.map_err(PriceWatchError::persistence)
    }

    async fn insert_notification_unless_recent(
        &self,
        notification: &Notification,
        since: DateTime<Utc>,
    ) -> PriceWatchResult<bool> {
        self.insert_notification_if_absent(notification, since)
            .await
            .map_err(PriceWatchError::persistence)
    }

    async fn recent_notifications(
        &self,
        user: &str,
        limit: i64,
    ) -> PriceWatchResult<Vec<Notification>> {
        self.notifications_for(user, limit)
            .await
            .map_err(PriceWatchError::persistence)
    }
}
