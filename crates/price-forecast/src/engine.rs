use anyhow::Result;
use news_sentiment::SentimentAnalyzer;
use price_history::{HistoryCascade, ResolvedHistory, SyntheticHistory, MIN_TRAINING_POINTS};
use pricewatch_core::{
    DataSource, ForecastPoint, ForecastResult, PriceHistory, PriceWatchResult, Recommendation,
    SentimentResult, Trend,
};
use std::env;

use crate::model::{ModelConfig, SeasonalModel};

/// Largest fractional shift sentiment may apply over the horizon.
pub const MAX_IMPACT: f64 = 0.10;
/// Longest horizon, and longest synthetic series, the engine will produce.
pub const MAX_HORIZON_DAYS: usize = 365;
const IMPACT_PER_POINT: f64 = 0.02;
const DROPPING_BELOW: f64 = 0.95;
const RISING_ABOVE: f64 = 1.05;

#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub horizon_days: usize,
    pub synthetic_days: usize,
    /// Train on a synthetic walk when no real history is reachable.
    pub synthetic_fallback: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            synthetic_days: price_history::synthetic::DEFAULT_SYNTHETIC_DAYS,
            synthetic_fallback: true,
        }
    }
}

impl ForecastConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            horizon_days: env::var("FORECAST_HORIZON_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            synthetic_days: env::var("SYNTHETIC_HISTORY_DAYS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            synthetic_fallback: env::var("SYNTHETIC_FALLBACK")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
        }
        .bounded())
    }

    /// Pull day counts into `1..=MAX_HORIZON_DAYS` (synthetic history never
    /// shorter than the training floor).
    pub fn bounded(self) -> Self {
        Self {
            horizon_days: self.horizon_days.clamp(1, MAX_HORIZON_DAYS),
            synthetic_days: self.synthetic_days.clamp(MIN_TRAINING_POINTS, MAX_HORIZON_DAYS),
            ..self
        }
    }
}

/// Fractional price shift for a sentiment score, clamped to ±10%.
pub fn impact_factor(score: i32) -> f64 {
    (IMPACT_PER_POINT * score as f64).clamp(-MAX_IMPACT, MAX_IMPACT)
}

/// Ramp the impact in linearly: day `i` of `n` gets `(i + 1) / n` of the full
/// shift, applied equally to the estimate and both bounds.
pub fn apply_drift(points: &mut [ForecastPoint], current_price: f64, impact: f64) {
    let n = points.len();
    for (i, p) in points.iter_mut().enumerate() {
        let drift = current_price * impact * (i + 1) as f64 / n as f64;
        p.predicted_price += drift;
        p.lower_bound += drift;
        p.upper_bound += drift;
    }
}

pub fn classify_trend(forecast: &[ForecastPoint], current_price: f64) -> Trend {
    match forecast.last() {
        Some(p) if p.predicted_price < current_price * DROPPING_BELOW => Trend::Dropping,
        Some(p) if p.predicted_price > current_price * RISING_ABOVE => Trend::Rising,
        _ => Trend::Stable,
    }
}

pub struct ForecastEngine {
    cascade: HistoryCascade,
    synthetic: SyntheticHistory,
    sentiment: Option<SentimentAnalyzer>,
    model: SeasonalModel,
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(cascade: HistoryCascade, config: ForecastConfig) -> Self {
        let config = config.bounded();
        Self {
            cascade,
            synthetic: SyntheticHistory::new(config.synthetic_days),
            sentiment: None,
            model: SeasonalModel::default(),
            config,
        }
    }

    pub fn with_sentiment(mut self, analyzer: SentimentAnalyzer) -> Self {
        self.sentiment = Some(analyzer);
        self
    }

    pub fn with_model(mut self, config: ModelConfig) -> Self {
        self.model = SeasonalModel::new(config);
        self
    }

    pub fn default_horizon(&self) -> usize {
        self.config.horizon_days
    }

    /// Real history first (only when a URL is known), then the synthetic walk
    /// if enabled. `None` means there is nothing to train on.
    pub async fn resolve_training_history(
        &self,
        product_url: Option<&str>,
        current_price: f64,
    ) -> Option<ResolvedHistory> {
        if let Some(url) = product_url.filter(|u| !u.trim().is_empty()) {
            if let Some(resolved) = self.cascade.resolve(url, current_price).await {
                return Some(resolved);
            }
        }

        if self.config.synthetic_fallback && current_price > 0.0 {
            tracing::info!("No real history, falling back to synthetic series");
            return Some(ResolvedHistory {
                history: self.synthetic.generate(current_price),
                source: DataSource::Synthetic,
            });
        }
        None
    }

    pub async fn forecast(
        &self,
        current_price: f64,
        product_url: Option<&str>,
        product_name: Option<&str>,
        horizon_days: usize,
    ) -> ForecastResult {
        let product_name = product_name.filter(|n| !n.trim().is_empty());

        let Some(resolved) = self.resolve_training_history(product_url, current_price).await else {
            tracing::info!(current_price, "Insufficient history");
            return ForecastResult {
                product_name: product_name.map(str::to_string),
                ..ForecastResult::insufficient(current_price)
            };
        };

        self.forecast_from_history(
            &resolved.history,
            resolved.source,
            current_price,
            product_name,
            horizon_days,
        )
        .await
    }

    /// Fit, bias and classify on an already-resolved history.
    pub async fn forecast_from_history(
        &self,
        history: &PriceHistory,
        source: DataSource,
        current_price: f64,
        product_name: Option<&str>,
        horizon_days: usize,
    ) -> ForecastResult {
        let name = product_name.map(str::to_string);
        let horizon_days = horizon_days.min(MAX_HORIZON_DAYS);

        if history.len() < MIN_TRAINING_POINTS {
            return ForecastResult {
                product_name: name,
                ..ForecastResult::insufficient(current_price)
            };
        }

        tracing::info!(points = history.len(), source = %source, "Training forecast model");

        let mut forecast = match self.fit_and_predict(history, horizon_days) {
            Ok(points) => points,
            Err(e) => {
                tracing::error!("Forecast model failed: {}", e);
                return ForecastResult {
                    product_name: name,
                    ..ForecastResult::error(current_price)
                };
            }
        };

        let news_context = match product_name {
            Some(n) => self.news_context(n).await,
            None => None,
        };

        if let Some(ctx) = news_context.as_ref().filter(|c| c.score != 0) {
            let impact = impact_factor(ctx.score);
            tracing::info!(
                score = ctx.score,
                impact_pct = impact * 100.0,
                "Applying news drift ({})",
                ctx.signal
            );
            apply_drift(&mut forecast, current_price, impact);
        }

        for p in forecast.iter_mut() {
            p.predicted_price = p.predicted_price.round();
            p.lower_bound = p.lower_bound.round();
            p.upper_bound = p.upper_bound.round();
        }

        let trend = classify_trend(&forecast, current_price);
        ForecastResult {
            product_name: name,
            current_price,
            trend,
            forecast,
            recommendation: Recommendation::for_trend(trend),
            data_source: source,
            news_context,
        }
    }

    fn fit_and_predict(
        &self,
        history: &PriceHistory,
        horizon_days: usize,
    ) -> PriceWatchResult<Vec<ForecastPoint>> {
        // Timezone-naive from here on.
        let samples: Vec<_> = history
            .points()
            .iter()
            .map(|p| (p.timestamp.naive_utc(), p.price))
            .collect();
        self.model.fit(&samples)?.predict(horizon_days)
    }

    async fn news_context(&self, product_name: &str) -> Option<SentimentResult> {
        match &self.sentiment {
            Some(analyzer) => Some(analyzer.sentiment(product_name).await),
            None => None,
        }
    }
}
