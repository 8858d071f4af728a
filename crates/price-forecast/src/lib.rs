//! Price forecasting: history resolution, a seasonal additive model, and a
//! bounded news-sentiment drift on top of it.

pub mod engine;
pub mod model;

pub use engine::{
    apply_drift, classify_trend, impact_factor, ForecastConfig, ForecastEngine, MAX_HORIZON_DAYS,
    MAX_IMPACT,
};
pub use model::{FittedModel, ModelConfig, SeasonalModel};
