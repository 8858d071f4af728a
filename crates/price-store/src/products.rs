use crate::db::{decode_ts, encode_ts, PriceDb};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use pricewatch_core::{
    PriceHistory, PricePoint, PriceWatchError, PriceWatchResult, Product, ProductObservation,
    ProductStore,
};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    title: String,
    url: String,
    source: Option<String>,
    image_url: Option<String>,
    latest_price: Option<f64>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = anyhow::Error;

    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(Product {
            id: row.id,
            title: row.title,
            url: row.url,
            source: row.source,
            image_url: row.image_url,
            latest_price: row.latest_price,
            created_at: decode_ts(&row.created_at)?,
            updated_at: decode_ts(&row.updated_at)?,
        })
    }
}

/// Products and their append-only price history.
#[derive(Clone)]
pub struct ProductTracker {
    db: PriceDb,
}

impl ProductTracker {
    /// Create a new product tracker
    pub fn new(db: PriceDb) -> Self {
        Self { db }
    }

    /// Record one observed price: upsert the product by URL, then append the
    /// history point in the same transaction.
    pub async fn track(&self, observation: &ProductObservation) -> Result<i64> {
        let now = encode_ts(Utc::now());
        let mut tx = self.db.pool().begin().await?;

        let (product_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO products (title, url, source, image_url, latest_price, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                latest_price = excluded.latest_price,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&observation.title)
        .bind(&observation.url)
        .bind(&observation.source)
        .bind(&observation.image_url)
        .bind(observation.price)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO price_history (product_id, price, created_at) VALUES (?, ?, ?)")
            .bind(product_id)
            .bind(observation.price)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(product_id, price = observation.price, "Tracked product price");
        Ok(product_id)
    }

    /// Get a product by its canonical URL
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE url = ?")
            .bind(url)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Full price history for the product at `url`, oldest first
    pub async fn history(&self, url: &str) -> Result<PriceHistory> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            r#"
            SELECT ph.created_at, ph.price
            FROM price_history ph
            JOIN products p ON p.id = ph.product_id
            WHERE p.url = ?
            ORDER BY ph.created_at ASC, ph.id ASC
            "#,
        )
        .bind(url)
        .fetch_all(self.db.pool())
        .await?;

        let mut history = PriceHistory::empty();
        for (created_at, price) in rows {
            history.append(PricePoint::new(decode_ts(&created_at)?, price));
        }
        Ok(history)
    }

    /// Append a point with an explicit timestamp. Used for backfills and tests;
    /// does not touch `latest_price`.
    pub async fn append_point(&self, product_id: i64, point: PricePoint) -> Result<()> {
        sqlx::query("INSERT INTO price_history (product_id, price, created_at) VALUES (?, ?, ?)")
            .bind(product_id)
            .bind(point.price)
            .bind(encode_ts(point.timestamp))
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for ProductTracker {
    async fn track_observation(&self, observation: &ProductObservation) -> PriceWatchResult<i64> {
        self.track(observation).await.map_err(PriceWatchError::persistence)
    }

    async fn product_by_url(&self, url: &str) -> PriceWatchResult<Option<Product>> {
        self.get_by_url(url).await.map_err(PriceWatchError::persistence)
    }

    async fn price_history(&self, url: &str) -> PriceWatchResult<PriceHistory> {
        self.history(url).await.map_err(PriceWatchError::persistence)
    }
}
