//! Forecast and product tracking endpoints.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use price_history::url::canonical_product_url;
use pricewatch_core::{ForecastResult, PriceHistory, ProductObservation};
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub product_name: String,
    pub current_price: f64,
    #[serde(default)]
    pub product_url: Option<String>,
}

impl PredictRequest {
    fn validate(&self) -> Result<(), AppError> {
        if !self.current_price.is_finite() || self.current_price < 0.0 {
            return Err(AppError::bad_request("current_price must be a non-negative number"));
        }
        Ok(())
    }

    fn canonical_url(&self) -> Option<String> {
        self.product_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .map(canonical_product_url)
    }
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub product_id: i64,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub url: String,
}

pub fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict))
        .route("/analyze", post(analyze))
        .route("/products/track", post(track_product))
        .route("/products/history", get(product_history))
}

/// Bare ForecastResult; this is also what bots relay to.
async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<ForecastResult>, AppError> {
    req.validate()?;
    let url = req.canonical_url();
    let name = Some(req.product_name.as_str());

    let result = state
        .engine
        .forecast(req.current_price, url.as_deref(), name, state.engine.default_horizon())
        .await;
    Ok(Json(result))
}

/// Same request, served through the bot failover chain.
async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<ApiResponse<ForecastResult>>, AppError> {
    req.validate()?;
    let url = req.canonical_url().unwrap_or_default();

    let result = state
        .router
        .route_analysis(&url, &req.product_name, req.current_price)
        .await;
    Ok(Json(ApiResponse::ok(result)))
}

async fn track_product(
    State(state): State<AppState>,
    Json(req): Json<TrackRequest>,
) -> Result<Json<ApiResponse<TrackResponse>>, AppError> {
    if req.title.trim().is_empty() || req.url.trim().is_empty() {
        return Err(AppError::bad_request("title and url are required"));
    }
    if !req.price.is_finite() || req.price < 0.0 {
        return Err(AppError::bad_request("price must be a non-negative number"));
    }

    let url = canonical_product_url(&req.url);
    let observation = ProductObservation {
        title: req.title,
        url: url.clone(),
        source: req.source,
        image_url: req.image_url,
        price: req.price,
    };
    let product_id = state.products.track(&observation).await?;
    Ok(Json(ApiResponse::ok(TrackResponse { product_id, url })))
}

async fn product_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<PriceHistory>>, AppError> {
    let history = state.products.history(&canonical_product_url(&q.url)).await?;
    Ok(Json(ApiResponse::ok(history)))
}
