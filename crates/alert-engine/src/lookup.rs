use async_trait::async_trait;
use pricewatch_core::{PriceLookup, PriceWatchError, PriceWatchResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ScrapePriceRequest<'a> {
    product_title: &'a str,
    product_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ScrapePriceResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    price: Option<f64>,
}

/// Asks the scraping backend for a product's live price.
pub struct HttpPriceLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPriceLookup {
    pub fn new(backend_url: &str, timeout: Duration) -> PriceWatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PriceWatchError::Config(format!("price lookup http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/scrape_price", backend_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl PriceLookup for HttpPriceLookup {
    /// A response without `success` or without a price reads as 0.
    async fn current_price(
        &self,
        product_title: &str,
        product_link: Option<&str>,
    ) -> PriceWatchResult<f64> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ScrapePriceRequest { product_title, product_url: product_link })
            .send()
            .await
            .map_err(PriceWatchError::lookup)?;

        if !response.status().is_success() {
            return Err(PriceWatchError::Lookup(format!(
                "scrape request failed: HTTP {}",
                response.status()
            )));
        }

        let body: ScrapePriceResponse = response.json().await.map_err(PriceWatchError::lookup)?;
        match body.price {
            Some(price) if body.success => Ok(price),
            _ => {
                tracing::warn!("No price found for {}", product_title);
                Ok(0.0)
            }
        }
    }
}
