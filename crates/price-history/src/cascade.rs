use pricewatch_core::{DataSource, HistorySource, PriceHistory};
use std::sync::Arc;

/// Fewest points the forecaster will ever train on.
pub const MIN_TRAINING_POINTS: usize = 3;
/// Persisted history at or above this size skips the external sources.
pub const PERSISTED_SUFFICIENT_POINTS: usize = 5;

/// History plus the provenance of the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHistory {
    pub history: PriceHistory,
    pub source: DataSource,
}

struct Stage {
    source: Arc<dyn HistorySource>,
    accept_at: usize,
}

/// Ordered chain of history strategies.
///
/// Each stage is tried in registration order. A stage whose result reaches its
/// own `accept_at` threshold wins immediately. Otherwise the first result that
/// is at least trainable is remembered and returned once every stage has been
/// tried, so a thin-but-real persisted series still beats an empty harvest.
#[derive(Default)]
pub struct HistoryCascade {
    stages: Vec<Stage>,
}

impl HistoryCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, source: Arc<dyn HistorySource>, accept_at: usize) -> Self {
        self.stages.push(Stage {
            source,
            accept_at: accept_at.max(MIN_TRAINING_POINTS),
        });
        self
    }

    /// The standard two-stage chain: persisted reader, then external harvester.
    pub fn standard(reader: Arc<dyn HistorySource>, harvester: Arc<dyn HistorySource>) -> Self {
        Self::new()
            .with_stage(reader, PERSISTED_SUFFICIENT_POINTS)
            .with_stage(harvester, MIN_TRAINING_POINTS)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// `None` when no stage produced enough points to train on.
    pub async fn resolve(&self, product_url: &str, current_price: f64) -> Option<ResolvedHistory> {
        let mut fallback: Option<ResolvedHistory> = None;

        for stage in &self.stages {
            let label = stage.source.label();
            let history = stage.source.resolve_history(product_url, current_price).await;
            tracing::info!(source = %label, points = history.len(), "History source tried");

            if history.len() >= stage.accept_at {
                return Some(ResolvedHistory { history, source: label });
            }
            if fallback.is_none() && history.len() >= MIN_TRAINING_POINTS {
                fallback = Some(ResolvedHistory { history, source: label });
            }
        }

        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use pricewatch_core::PricePoint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        label: DataSource,
        points: usize,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(label: DataSource, points: usize) -> Arc<Self> {
            Arc::new(Self { label, points, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl HistorySource for FixedSource {
        fn label(&self) -> DataSource {
            self.label
        }

        async fn resolve_history(&self, _url: &str, price: f64) -> PriceHistory {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = Utc::now();
            PriceHistory::from_points(
                (0..self.points)
                    .map(|i| PricePoint::new(now - Duration::days(i as i64), price))
                    .collect(),
            )
        }
    }

    #[tokio::test]
    async fn test_sufficient_persisted_history_skips_harvester() {
        let reader = FixedSource::new(DataSource::PersistedHistory, 5);
        let harvester = FixedSource::new(DataSource::ExternalScraper, 30);
        let cascade = HistoryCascade::standard(reader.clone(), harvester.clone());

        let resolved = cascade.resolve("https://x", 450.0).await.unwrap();
        assert_eq!(resolved.source, DataSource::PersistedHistory);
        assert_eq!(resolved.history.len(), 5);
        assert_eq!(harvester.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_thin_persisted_history_tries_harvester_first() {
        let reader = FixedSource::new(DataSource::PersistedHistory, 4);
        let harvester = FixedSource::new(DataSource::ExternalScraper, 12);
        let cascade = HistoryCascade::standard(reader, harvester.clone());

        let resolved = cascade.resolve("https://x", 450.0).await.unwrap();
        assert_eq!(resolved.source, DataSource::ExternalScraper);
        assert_eq!(harvester.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_thin_persisted_history_kept_when_harvest_empty() {
        let reader = FixedSource::new(DataSource::PersistedHistory, 3);
        let harvester = FixedSource::new(DataSource::ExternalScraper, 0);
        let cascade = HistoryCascade::standard(reader, harvester);

        let resolved = cascade.resolve("https://x", 450.0).await.unwrap();
        assert_eq!(resolved.source, DataSource::PersistedHistory);
        assert_eq!(resolved.history.len(), 3);
    }

    #[tokio::test]
    async fn test_nothing_trainable_returns_none() {
        let reader = FixedSource::new(DataSource::PersistedHistory, 2);
        let harvester = FixedSource::new(DataSource::ExternalScraper, 2);
        let cascade = HistoryCascade::standard(reader, harvester);

        assert!(cascade.resolve("https://x", 450.0).await.is_none());
        assert!(HistoryCascade::new().resolve("https://x", 1.0).await.is_none());
    }
}
