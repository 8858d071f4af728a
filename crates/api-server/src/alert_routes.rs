//! Alert-set and notification endpoints.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use price_history::url::canonical_product_url;
use pricewatch_core::{Alert, Notification};
use serde::{Deserialize, Serialize};

use crate::request_id::RequestId;
use crate::{ApiResponse, AppError, AppState};

const DEFAULT_NOTIFICATION_LIMIT: i64 = 20;
const MAX_NOTIFICATION_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct SetAlertRequest {
    pub product_url: String,
    pub target_price: f64,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct SetAlertResponse {
    pub accepted: bool,
    pub product_url: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub user: String,
    pub limit: Option<i64>,
}

pub fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", post(set_alert))
        .route("/alerts/direct", post(create_alert_direct))
        .route("/notifications", get(list_notifications))
}

impl SetAlertRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.product_url.trim().is_empty() || self.user_id.trim().is_empty() {
            return Err(AppError::bad_request("product_url and user_id are required"));
        }
        if !self.target_price.is_finite() || self.target_price <= 0.0 {
            return Err(AppError::bad_request("target_price must be positive"));
        }
        Ok(())
    }
}

async fn set_alert(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<SetAlertRequest>,
) -> Result<Json<ApiResponse<SetAlertResponse>>, AppError> {
    req.validate()?;
    let url = canonical_product_url(&req.product_url);
    tracing::info!(request_id = %request_id.0, user = %req.user_id, "Setting alert for {}", url);

    if !state.router.route_alert(&url, req.target_price, &req.user_id).await {
        return Err(AppError::unavailable("alert could not be set by any route"));
    }
    Ok(Json(ApiResponse::ok(SetAlertResponse { accepted: true, product_url: url })))
}

/// Persist an alert without touching the bots. This is what bots relay
/// `/alert` to, so it must never route back through them.
async fn create_alert_direct(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<SetAlertRequest>,
) -> Result<Json<ApiResponse<Alert>>, AppError> {
    req.validate()?;
    let url = canonical_product_url(&req.product_url);
    tracing::info!(request_id = %request_id.0, user = %req.user_id, "Creating alert for {}", url);

    let alert = state.evaluator.set_alert(&url, req.target_price, &req.user_id).await?;
    Ok(Json(ApiResponse::ok(alert)))
}

async fn list_notifications(
    State(state): State<AppState>,
    Query(q): Query<NotificationQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, AppError> {
    let limit = q
        .limit
        .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
        .clamp(1, MAX_NOTIFICATION_LIMIT);
    let notifications = state.alerts.notifications_for(&q.user, limit).await?;
    Ok(Json(ApiResponse::ok(notifications)))
}
