use chrono::Utc;
use pricewatch_core::{
    Alert, AlertStore, NewAlert, PriceLookup, PriceWatchError, PriceWatchResult, ProductStore,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::notifier::{DropNotice, Notifier};

/// Counts from one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    pub checked: usize,
    pub refreshed: usize,
    pub price_drops: usize,
    pub notified: usize,
    pub lookup_failures: usize,
    pub errors: usize,
}

enum AlertOutcome {
    LookupFailed,
    Refreshed { dropped: bool, notified: bool },
}

pub struct AlertEvaluator {
    alerts: Arc<dyn AlertStore>,
    products: Arc<dyn ProductStore>,
    lookup: Arc<dyn PriceLookup>,
    notifier: Notifier,
    pause: Duration,
}

impl AlertEvaluator {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        products: Arc<dyn ProductStore>,
        lookup: Arc<dyn PriceLookup>,
        pause: Duration,
    ) -> Self {
        Self {
            notifier: Notifier::new(alerts.clone()),
            alerts,
            products,
            lookup,
            pause,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// One sequential pass over a snapshot of the active alerts.
    ///
    /// Only a failure to load the snapshot is returned as an error; anything
    /// that goes wrong for a single alert is logged, counted, and the pass
    /// moves on.
    pub async fn evaluate(&self) -> PriceWatchResult<EvaluationSummary> {
        tracing::info!("Starting price alert check");

        let alerts = self.alerts.active_alerts().await?;
        let mut summary = EvaluationSummary::default();
        if alerts.is_empty() {
            tracing::info!("No active alerts to process");
            return Ok(summary);
        }
        tracing::info!("Found {} active alerts", alerts.len());

        for (i, alert) in alerts.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }

            summary.checked += 1;
            match self.evaluate_alert(alert).await {
                Ok(AlertOutcome::LookupFailed) => summary.lookup_failures += 1,
                Ok(AlertOutcome::Refreshed { dropped, notified }) => {
                    summary.refreshed += 1;
                    if dropped {
                        summary.price_drops += 1;
                    }
                    if notified {
                        summary.notified += 1;
                    }
                }
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!(alert_id = %alert.id, "Error processing alert: {}", e);
                }
            }
        }

        tracing::info!(
            checked = summary.checked,
            refreshed = summary.refreshed,
            price_drops = summary.price_drops,
            errors = summary.errors,
            "Completed price alert check"
        );
        Ok(summary)
    }

    async fn evaluate_alert(&self, alert: &Alert) -> PriceWatchResult<AlertOutcome> {
        tracing::debug!(alert_id = %alert.id, "Checking price for {}", alert.product_title);

        let price = match self
            .lookup
            .current_price(&alert.product_title, alert.product_link.as_deref())
            .await
        {
            Ok(p) if p > 0.0 => p,
            Ok(_) => {
                tracing::warn!(alert_id = %alert.id, "No price found for {}", alert.product_title);
                return Ok(AlertOutcome::LookupFailed);
            }
            Err(e) => {
                tracing::warn!(alert_id = %alert.id, "Price lookup failed: {}", e);
                return Ok(AlertOutcome::LookupFailed);
            }
        };

        self.alerts.update_alert_price(&alert.id, price, Utc::now()).await?;
        tracing::info!(alert_id = %alert.id, price, "Updated alert price");

        if price >= alert.target_price {
            return Ok(AlertOutcome::Refreshed { dropped: false, notified: false });
        }

        tracing::info!(
            alert_id = %alert.id,
            price,
            target = alert.target_price,
            "Price drop detected for {}",
            alert.product_title
        );
        // The user sees their own target as the "was" price.
        let notice = DropNotice::for_alert(alert, alert.target_price, price);
        let notified = self.notifier.notify(&notice).await?;
        Ok(AlertOutcome::Refreshed { dropped: true, notified })
    }

    /// Direct alert creation, used when no bot accepted the request.
    pub async fn set_alert(
        &self,
        product_url: &str,
        target_price: f64,
        user: &str,
    ) -> PriceWatchResult<Alert> {
        if product_url.trim().is_empty() {
            return Err(PriceWatchError::InvalidRequest("product_url is required".into()));
        }
        if user.trim().is_empty() {
            return Err(PriceWatchError::InvalidRequest("user is required".into()));
        }
        if !(target_price.is_finite() && target_price > 0.0) {
            return Err(PriceWatchError::InvalidRequest(format!(
                "target_price must be positive, got {target_price}"
            )));
        }

        let product = match self.products.product_by_url(product_url).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Product lookup failed for {}: {}", product_url, e);
                None
            }
        };

        let new_alert = NewAlert {
            user: user.to_string(),
            product_title: product
                .as_ref()
                .map(|p| p.title.clone())
                .unwrap_or_else(|| product_url.to_string()),
            target_price,
            current_price: product.as_ref().and_then(|p| p.latest_price),
            product_image: product.as_ref().and_then(|p| p.image_url.clone()),
            product_link: Some(product_url.to_string()),
        };

        let alert = self.alerts.create_alert(&new_alert).await?;
        tracing::info!(alert_id = %alert.id, user, target_price, "Alert set for {}", product_url);
        Ok(alert)
    }
}
