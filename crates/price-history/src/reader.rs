use async_trait::async_trait;
use pricewatch_core::{DataSource, HistorySource, PriceHistory, ProductStore};
use std::sync::Arc;

/// Reads history we recorded ourselves, matched by exact product URL.
pub struct PersistedHistoryReader {
    store: Arc<dyn ProductStore>,
}

impl PersistedHistoryReader {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HistorySource for PersistedHistoryReader {
    fn label(&self) -> DataSource {
        DataSource::PersistedHistory
    }

    async fn resolve_history(&self, product_url: &str, _current_price: f64) -> PriceHistory {
        match self.store.price_history(product_url).await {
            Ok(history) => {
                tracing::debug!(points = history.len(), "Persisted history loaded");
                history
            }
            Err(e) => {
                tracing::warn!("Persisted history unavailable for {}: {}", product_url, e);
                PriceHistory::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pricewatch_core::{
        PricePoint, PriceWatchError, PriceWatchResult, Product, ProductObservation,
    };

    struct FailingStore;

    #[async_trait]
    impl ProductStore for FailingStore {
        async fn track_observation(&self, _: &ProductObservation) -> PriceWatchResult<i64> {
            Err(PriceWatchError::Persistence("down".into()))
        }
        async fn product_by_url(&self, _: &str) -> PriceWatchResult<Option<Product>> {
            Err(PriceWatchError::Persistence("down".into()))
        }
        async fn price_history(&self, _: &str) -> PriceWatchResult<PriceHistory> {
            Err(PriceWatchError::Persistence("down".into()))
        }
    }

    struct OnePointStore;

    #[async_trait]
    impl ProductStore for OnePointStore {
        async fn track_observation(&self, _: &ProductObservation) -> PriceWatchResult<i64> {
            Ok(1)
        }
        async fn product_by_url(&self, _: &str) -> PriceWatchResult<Option<Product>> {
            Ok(None)
        }
        async fn price_history(&self, _: &str) -> PriceWatchResult<PriceHistory> {
            Ok(PriceHistory::from_points(vec![PricePoint::new(Utc::now(), 42.0)]))
        }
    }

    #[tokio::test]
    async fn test_store_error_degrades_to_empty() {
        let reader = PersistedHistoryReader::new(Arc::new(FailingStore));
        assert!(reader.resolve_history("https://x", 10.0).await.is_empty());
        assert_eq!(reader.label(), DataSource::PersistedHistory);
    }

    #[tokio::test]
    async fn test_returns_store_history() {
        let reader = PersistedHistoryReader::new(Arc::new(OnePointStore));
        assert_eq!(reader.resolve_history("https://x", 10.0).await.len(), 1);
    }
}
