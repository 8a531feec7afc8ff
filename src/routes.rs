use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    cache::CacheStatus,
    service::{RefreshError, WeatherReport, WeatherService},
    weather::CityFetcher,
};

// Shared application state
pub struct AppState<F> {
    pub service: Arc<WeatherService<F>>,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub cache: CacheStatus,
    pub cache_ttl_secs: i64,
    pub cache_age_secs: Option<i64>,
    pub configured_cities: usize,
    pub cached_cities: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    pub status: CacheStatus,
}

/// Body returned instead of data when a request could not be served.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            code: code.to_string(),
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for RefreshError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new(&self.to_string(), "AGGREGATION_FAILED");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

// Route handlers
pub async fn health<F: CityFetcher>(State(state): State<AppState<F>>) -> Json<HealthResponse> {
    let now = Utc::now();
    let cache = state.service.cache();

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: now,
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: cache.status(now),
        cache_ttl_secs: cache.ttl().num_seconds(),
        cache_age_secs: cache.age(now).map(|age| age.num_seconds()),
        configured_cities: state.service.aggregator().cities().len(),
        cached_cities: cache.read().map_or(0, |e| e.data.len()),
    })
}

pub async fn get_weather<F: CityFetcher>(
    State(state): State<AppState<F>>,
) -> Result<Json<WeatherReport>, RefreshError> {
    let report = state.service.get_weather().await?;
    Ok(Json(report))
}

pub async fn get_cache_status<F: CityFetcher>(
    State(state): State<AppState<F>>,
) -> Json<CacheStatusResponse> {
    Json(CacheStatusResponse {
        status: state.service.cache_status(),
    })
}

// Create the router
pub fn create_router<F: CityFetcher>(state: AppState<F>) -> Router {
    Router::new()
        .route("/health", get(health::<F>))
        .route("/api/weather", get(get_weather::<F>))
        .route("/api/cache-status", get(get_cache_status::<F>))
        .with_state(state)
}
