//! HTTP adapter over the forecast engine and alert routing.

use alert_engine::{AlertConfig, AlertEvaluator, HttpPriceLookup};
use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bot_router::{BotFallbackRouter, BotRegistry, BotTransport, TelegramBot, TelegramConfig};
use news_sentiment::{GoogleNewsFeed, NewsConfig, SentimentAnalyzer};
use price_forecast::{ForecastConfig, ForecastEngine};
use price_history::{ExternalHarvester, HarvesterConfig, HistoryCascade, PersistedHistoryReader};
use price_store::{AlertManager, PriceDb, ProductTracker};
use pricewatch_core::PriceWatchError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub mod alert_routes;
pub mod forecast_routes;
pub mod request_id;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ForecastEngine>,
    pub router: Arc<BotFallbackRouter>,
    pub evaluator: Arc<AlertEvaluator>,
    pub registry: Arc<BotRegistry>,
    pub alerts: Arc<AlertManager>,
    pub products: Arc<ProductTracker>,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self { status: StatusCode::SERVICE_UNAVAILABLE, message: message.into() }
    }
}

impl From<PriceWatchError> for AppError {
    fn from(err: PriceWatchError) -> Self {
        let status = match err {
            PriceWatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PriceWatchError::DataUnavailable(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: err.to_string() }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {}", self.message);
        }
        let body = ApiResponse::<()> { success: false, data: None, error: Some(self.message) };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("API_PORT must be a port number")?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:pricewatch.db".to_string()),
            request_timeout: Duration::from_secs(
                std::env::var("API_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "90".to_string())
                    .parse()?,
            ),
        })
    }
}

/// Wire every collaborator from the environment. Bots are not verified here;
/// call `registry.initialize()` before serving.
pub async fn build_state(db: PriceDb) -> Result<AppState> {
    let products = Arc::new(ProductTracker::new(db.clone()));
    let alerts = Arc::new(AlertManager::new(db));

    let harvester = ExternalHarvester::new(HarvesterConfig::from_env())?;
    let cascade = HistoryCascade::standard(
        Arc::new(PersistedHistoryReader::new(products.clone())),
        Arc::new(harvester),
    );
    let feed = GoogleNewsFeed::new(NewsConfig::from_env())?;
    let engine = Arc::new(
        ForecastEngine::new(cascade, ForecastConfig::from_env()?)
            .with_sentiment(SentimentAnalyzer::new(Arc::new(feed))),
    );

    let alert_config = AlertConfig::from_env()?;
    let lookup = HttpPriceLookup::new(&alert_config.backend_url, alert_config.lookup_timeout)?;
    let evaluator = Arc::new(AlertEvaluator::new(
        alerts.clone(),
        products.clone(),
        Arc::new(lookup),
        alert_config.pause_between,
    ));

    let telegram = TelegramConfig::from_env();
    let bots = TelegramBot::from_config(&telegram)?
        .into_iter()
        .map(|b| Arc::new(b) as Arc<dyn BotTransport>)
        .collect();
    let registry = Arc::new(BotRegistry::new(bots));

    let router = Arc::new(BotFallbackRouter::new(
        registry.clone(),
        engine.clone(),
        evaluator.clone(),
    ));

    Ok(AppState { engine, router, evaluator, registry, alerts, products })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .merge(forecast_routes::forecast_routes())
        .merge(alert_routes::alert_routes())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server() -> Result<()> {
    let config = ServerConfig::from_env()?;
    let db = PriceDb::new(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;

    let state = build_state(db).await?;
    let active = state.registry.initialize().await;
    tracing::info!("{} messaging bots active", active);

    let registry = state.registry.clone();
    let app = app(state, config.request_timeout);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
