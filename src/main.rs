use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::Arc;

mod aggregator;
mod cache;
mod config;
mod routes;
mod scoring;
mod service;
mod weather;

use aggregator::Aggregator;
use cache::CacheStore;
use config::Config;
use routes::{create_router, AppState};
use service::WeatherService;
use weather::openweather::OpenWeatherClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "city_comfort_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        cities = config.cities.len(),
        ttl_secs = config.cache_ttl.as_secs(),
        fetch_timeout_secs = config.fetch_timeout.as_secs(),
        single_flight = config.single_flight,
        "Configuration loaded"
    );

    // Initialize weather client
    let weather_client = Arc::new(OpenWeatherClient::new(&config)?);

    let aggregator = Aggregator::new(
        weather_client,
        Arc::clone(&config.cities),
        config.fetch_concurrency,
    );
    let service = WeatherService::new(
        CacheStore::new(config.cache_ttl),
        aggregator,
        config.single_flight,
    );

    // Create application state
    let state = AppState {
        service: Arc::new(service),
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
