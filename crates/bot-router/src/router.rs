use alert_engine::AlertEvaluator;
use price_forecast::ForecastEngine;
use pricewatch_core::ForecastResult;
use std::sync::Arc;

use crate::registry::BotRegistry;

/// Ordered failover across the registry's active bots, then the direct path.
pub struct BotFallbackRouter {
    registry: Arc<BotRegistry>,
    engine: Arc<ForecastEngine>,
    evaluator: Arc<AlertEvaluator>,
}

impl BotFallbackRouter {
    pub fn new(
        registry: Arc<BotRegistry>,
        engine: Arc<ForecastEngine>,
        evaluator: Arc<AlertEvaluator>,
    ) -> Self {
        Self { registry, engine, evaluator }
    }

    /// The direct engine always produces a result, so once the bots are
    /// exhausted this never comes back empty.
    pub async fn route_analysis(
        &self,
        product_url: &str,
        product_name: &str,
        current_price: f64,
    ) -> ForecastResult {
        for (i, bot) in self.registry.active().await.iter().enumerate() {
            tracing::info!(bot = bot.name(), "Trying bot {} for price analysis", i + 1);
            match bot.request_analysis(product_url, product_name, current_price).await {
                Ok(Some(result)) => {
                    tracing::info!(bot = bot.name(), "Bot provided analysis");
                    return result;
                }
                Ok(None) => tracing::warn!(bot = bot.name(), "Bot returned no analysis"),
                Err(e) => tracing::error!(bot = bot.name(), "Bot analysis failed: {}", e),
            }
        }

        tracing::warn!("No bot answered, running forecast directly");
        self.engine
            .forecast(
                current_price,
                Some(product_url),
                Some(product_name),
                self.engine.default_horizon(),
            )
            .await
    }

    pub async fn route_alert(&self, product_url: &str, target_price: f64, user: &str) -> bool {
        for (i, bot) in self.registry.active().await.iter().enumerate() {
            tracing::info!(bot = bot.name(), "Trying bot {} for price alert", i + 1);
            match bot.request_alert(product_url, target_price, user).await {
                Ok(true) => return true,
                Ok(false) => tracing::warn!(bot = bot.name(), "Bot declined alert"),
                Err(e) => tracing::error!(bot = bot.name(), "Bot alert failed: {}", e),
            }
        }

        tracing::warn!("No bot accepted the alert, setting it directly");
        match self.evaluator.set_alert(product_url, target_price, user).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Direct alert failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BotTransport;
    use async_trait::async_trait;
    use price_forecast::ForecastConfig;
    use price_history::HistoryCascade;
    use price_store::{AlertManager, PriceDb, ProductTracker};
    use pricewatch_core::{DataSource, PriceLookup, PriceWatchError, PriceWatchResult, Trend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Behaviour {
        Fail,
        Empty,
        Answer,
    }

    struct ScriptedBot {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl ScriptedBot {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self { name, behaviour, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl BotTransport for ScriptedBot {
        fn name(&self) -> &str {
            self.name
        }
        async fn verify(&self) -> PriceWatchResult<()> {
            Ok(())
        }
        async fn request_analysis(
            &self,
            _: &str,
            _: &str,
            price: f64,
        ) -> PriceWatchResult<Option<ForecastResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Fail => Err(PriceWatchError::Transport("connection refused".into())),
                Behaviour::Empty => Ok(None),
                Behaviour::Answer => Ok(Some(ForecastResult {
                    product_name: Some(self.name.to_string()),
                    ..ForecastResult::insufficient(price)
                })),
            }
        }
        async fn request_alert(&self, _: &str, _: f64, _: &str) -> PriceWatchResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Fail => Err(PriceWatchError::Transport("connection refused".into())),
                Behaviour::Empty => Ok(false),
                Behaviour::Answer => Ok(true),
            }
        }
    }

    struct NoLookup;

    #[async_trait]
    impl PriceLookup for NoLookup {
        async fn current_price(&self, _: &str, _: Option<&str>) -> PriceWatchResult<f64> {
            Ok(0.0)
        }
    }

    async fn router(bots: Vec<Arc<ScriptedBot>>) -> (BotFallbackRouter, Arc<AlertManager>) {
        let db = PriceDb::new("sqlite::memory:").await.unwrap();
        let alerts = Arc::new(AlertManager::new(db.clone()));
        let products = Arc::new(ProductTracker::new(db));

        let engine = ForecastEngine::new(HistoryCascade::new(), ForecastConfig::default());
        let evaluator =
            AlertEvaluator::new(alerts.clone(), products, Arc::new(NoLookup), Duration::ZERO);

        let registry = BotRegistry::new(
            bots.into_iter().map(|b| b as Arc<dyn BotTransport>).collect(),
        );
        registry.initialize().await;

        (
            BotFallbackRouter::new(Arc::new(registry), Arc::new(engine), Arc::new(evaluator)),
            alerts,
        )
    }

    #[tokio::test]
    async fn test_first_answering_bot_wins() {
        let first = ScriptedBot::new("first", Behaviour::Fail);
        let second = ScriptedBot::new("second", Behaviour::Empty);
        let third = ScriptedBot::new("third", Behaviour::Answer);
        let fourth = ScriptedBot::new("fourth", Behaviour::Answer);
        let (router, _) =
            router(vec![first.clone(), second.clone(), third.clone(), fourth.clone()]).await;

        let result = router.route_analysis("https://x/p", "Intel i7", 1000.0).await;
        assert_eq!(result.product_name.as_deref(), Some("third"));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fourth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_bots_failing_falls_back_to_engine() {
        let (router, _) = router(vec![
            ScriptedBot::new("a", Behaviour::Fail),
            ScriptedBot::new("b", Behaviour::Fail),
        ])
        .await;

        let result = router.route_analysis("https://x/p", "Boat Rockerz 255", 1299.0).await;
        assert_eq!(result.data_source, DataSource::Synthetic);
        assert_ne!(result.trend, Trend::Unknown);
        assert_eq!(result.forecast.len(), 30);
    }

    #[tokio::test]
    async fn test_no_bots_sets_alert_directly() {
        let (router, alerts) = router(vec![]).await;
        assert!(router.route_alert("https://x/p", 250.0, "priya@example.com").await);

        let active = alerts.get_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].target_price, 250.0);
    }

    #[tokio::test]
    async fn test_bot_accepting_alert_skips_direct_path() {
        let bot = ScriptedBot::new("a", Behaviour::Answer);
        let (router, alerts) = router(vec![ScriptedBot::new("z", Behaviour::Empty), bot.clone()]).await;

        assert!(router.route_alert("https://x/p", 250.0, "priya@example.com").await);
        assert_eq!(bot.calls.load(Ordering::SeqCst), 1);
        assert!(alerts.get_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_alert_rejection_reports_false() {
        let (router, _) = router(vec![ScriptedBot::new("a", Behaviour::Fail)]).await;
        assert!(!router.route_alert("https://x/p", -5.0, "priya@example.com").await);
    }
}
