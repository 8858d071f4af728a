use async_trait::async_trait;
use chrono::{Duration, Utc};
use pricewatch_core::{DataSource, HistorySource, PriceHistory, PricePoint};
use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Normal;

pub const DEFAULT_SYNTHETIC_DAYS: usize = 60;

/// Daily volatility assumed for a product, as a fraction of its price.
const VOLATILITY: f64 = 0.05;
/// Share of that volatility applied per step.
const STEP_SCALE: f64 = 0.2;

/// Anchored random walk: plausible-looking but directionally uninformative
/// history whose final point is exactly the current price.
#[derive(Debug, Clone)]
pub struct SyntheticHistory {
    days: usize,
}

impl Default for SyntheticHistory {
    fn default() -> Self {
        Self::new(DEFAULT_SYNTHETIC_DAYS)
    }
}

impl SyntheticHistory {
    pub fn new(days: usize) -> Self {
        Self { days }
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn generate(&self, current_price: f64) -> PriceHistory {
        self.generate_with_rng(current_price, &mut rand::thread_rng())
    }

    /// One point per day ending now. Increments are N(0, 0.05 * price * 0.2),
    /// accumulated, then the whole walk is shifted onto `current_price`.
    pub fn generate_with_rng<R: Rng + ?Sized>(&self, current_price: f64, rng: &mut R) -> PriceHistory {
        if self.days == 0 {
            return PriceHistory::empty();
        }

        let mut prices = Vec::with_capacity(self.days);
        prices.push(current_price);

        match Normal::new(0.0, current_price * VOLATILITY * STEP_SCALE) {
            Ok(step) => {
                for _ in 1..self.days {
                    let prev = prices[prices.len() - 1];
                    prices.push(prev + step.sample(&mut *rng));
                }
            }
            // Zero or invalid price: nothing to walk around.
            Err(_) => prices.resize(self.days, current_price),
        }

        let offset = prices[prices.len() - 1] - current_price;
        for p in prices.iter_mut() {
            *p -= offset;
        }
        // Subtracting the offset can be off by one ulp.
        if let Some(last) = prices.last_mut() {
            *last = current_price;
        }

        let end = Utc::now();
        let start = end - Duration::days(self.days as i64 - 1);
        PriceHistory::from_points(
            prices
                .into_iter()
                .enumerate()
                .map(|(i, price)| PricePoint::new(start + Duration::days(i as i64), price))
                .collect(),
        )
    }
}

#[async_trait]
impl HistorySource for SyntheticHistory {
    fn label(&self) -> DataSource {
        DataSource::Synthetic
    }

    async fn resolve_history(&self, _product_url: &str, current_price: f64) -> PriceHistory {
        self.generate(current_price)
    }
}
