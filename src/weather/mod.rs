pub mod openweather;
pub mod types;

use std::future::Future;
use thiserror::Error;

use crate::config::CityConfig;
use openweather::OpenWeatherError;
use types::Observation;

/// One city could not be fetched. Never retried.
#[derive(Error, Debug)]
#[error("fetch failed for city {city_id}: {source}")]
pub struct FetchError {
    pub city_id: String,
    #[source]
    pub source: OpenWeatherError,
}

/// Source of current observations, one city per call.
pub trait CityFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        city: &CityConfig,
    ) -> impl Future<Output = Result<Observation, FetchError>> + Send;
}
