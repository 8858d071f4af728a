use async_trait::async_trait;
use pricewatch_core::{ForecastResult, PriceWatchResult};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One messaging-bot instance. Each has its own independent failure modes.
#[async_trait]
pub trait BotTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap reachability check used at startup.
    async fn verify(&self) -> PriceWatchResult<()>;

    /// `Ok(None)` means the bot answered but had no result.
    async fn request_analysis(
        &self,
        product_url: &str,
        product_name: &str,
        current_price: f64,
    ) -> PriceWatchResult<Option<ForecastResult>>;

    async fn request_alert(
        &self,
        product_url: &str,
        target_price: f64,
        user: &str,
    ) -> PriceWatchResult<bool>;
}

/// Configured bots plus the subset that passed verification.
///
/// Nothing is active until [`initialize`](Self::initialize) runs, and
/// [`shutdown`](Self::shutdown) empties the active set again.
pub struct BotRegistry {
    configured: Vec<Arc<dyn BotTransport>>,
    active: RwLock<Vec<Arc<dyn BotTransport>>>,
}

impl BotRegistry {
    pub fn new(configured: Vec<Arc<dyn BotTransport>>) -> Self {
        Self {
            configured,
            active: RwLock::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn configured(&self) -> usize {
        self.configured.len()
    }

    /// Verify every configured bot, keeping registration order. Returns how
    /// many are active.
    pub async fn initialize(&self) -> usize {
        let mut reachable = Vec::with_capacity(self.configured.len());
        for bot in &self.configured {
            match bot.verify().await {
                Ok(()) => reachable.push(bot.clone()),
                Err(e) => tracing::error!(bot = bot.name(), "Failed to initialize bot: {}", e),
            }
        }

        let count = reachable.len();
        *self.active.write().await = reachable;
        tracing::info!("Initialized {} of {} bots", count, self.configured.len());
        count
    }

    pub async fn shutdown(&self) {
        let mut active = self.active.write().await;
        tracing::info!("Releasing {} bots", active.len());
        active.clear();
    }

    /// Snapshot in registration order.
    pub async fn active(&self) -> Vec<Arc<dyn BotTransport>> {
        self.active.read().await.clone()
    }
}
