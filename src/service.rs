use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::aggregator::{AggregationError, Aggregator};
use crate::cache::{CacheStatus, CacheStore, CachedRanking};
use crate::weather::types::ScoredCity;
use crate::weather::CityFetcher;

#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub source: CacheStatus,
    pub data: Arc<[ScoredCity]>,
}

impl WeatherReport {
    fn from_entry(source: CacheStatus, entry: &CachedRanking) -> Self {
        Self {
            source,
            data: Arc::clone(&entry.data),
        }
    }
}

/// A failed refresh. Cloneable so every caller that waited on the same
/// refresh gets the same error.
#[derive(Error, Debug, Clone)]
#[error(transparent)]
pub struct RefreshError(Arc<AggregationError>);

impl RefreshError {
    pub fn cause(&self) -> &AggregationError {
        &self.0
    }
}

impl From<AggregationError> for RefreshError {
    fn from(err: AggregationError) -> Self {
        Self(Arc::new(err))
    }
}

type RefreshOutcome = Result<Arc<CachedRanking>, RefreshError>;

/// At most one refresh at a time. `completed` counts finished refreshes so
/// a caller that waited on the lock can tell whether `last` is news to it.
struct SingleFlight {
    last: Mutex<Option<RefreshOutcome>>,
    completed: AtomicU64,
}

/// Entry point for callers: serves the cached ranking while it is fresh,
/// otherwise runs a refresh and stores the result.
pub struct WeatherService<F> {
    cache: CacheStore,
    aggregator: Aggregator<F>,
    single_flight: Option<SingleFlight>,
}

impl<F: CityFetcher> WeatherService<F> {
    pub fn new(cache: CacheStore, aggregator: Aggregator<F>, single_flight: bool) -> Self {
        Self {
            cache,
            aggregator,
            single_flight: single_flight.then(|| SingleFlight {
                last: Mutex::new(None),
                completed: AtomicU64::new(0),
            }),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn aggregator(&self) -> &Aggregator<F> {
        &self.aggregator
    }

    pub async fn get_weather(&self) -> Result<WeatherReport, RefreshError> {
        self.get_weather_at(Utc::now).await
    }

    /// `now` is sampled on entry and again when the refresh result is stored.
    pub async fn get_weather_at<C>(&self, now: C) -> Result<WeatherReport, RefreshError>
    where
        C: Fn() -> DateTime<Utc>,
    {
        if let Some(entry) = self.cache.fresh(now()) {
            tracing::debug!("Cache hit");
            return Ok(WeatherReport::from_entry(CacheStatus::Hit, &entry));
        }

        let Some(flight) = &self.single_flight else {
            let entry = self.refresh_and_store(&now).await?;
            return Ok(WeatherReport::from_entry(CacheStatus::Miss, &entry));
        };

        let seen = flight.completed.load(Ordering::SeqCst);
        let mut last = flight.last.lock().await;

        if flight.completed.load(Ordering::SeqCst) != seen {
            if let Some(outcome) = last.as_ref() {
                tracing::debug!("Sharing outcome of the refresh we waited on");
                return match outcome {
                    Ok(entry) => Ok(WeatherReport::from_entry(CacheStatus::Hit, entry)),
                    Err(e) => Err(e.clone()),
                };
            }
        }
        if let Some(entry) = self.cache.fresh(now()) {
            tracing::debug!("Cache hit after acquiring refresh lock");
            return Ok(WeatherReport::from_entry(CacheStatus::Hit, &entry));
        }

        let outcome = self.refresh_and_store(&now).await;
        *last = Some(outcome.clone());
        flight.completed.fetch_add(1, Ordering::SeqCst);

        let entry = outcome?;
        Ok(WeatherReport::from_entry(CacheStatus::Miss, &entry))
    }

    async fn refresh_and_store<C>(&self, now: &C) -> RefreshOutcome
    where
        C: Fn() -> DateTime<Utc>,
    {
        tracing::debug!("Cache miss, refreshing");
        match self.aggregator.refresh().await {
            Ok(ranked) => Ok(self.cache.write(ranked, now())),
            Err(e) => {
                tracing::error!("Weather refresh failed: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache_status_at(Utc::now())
    }

    pub fn cache_status_at(&self, now: DateTime<Utc>) -> CacheStatus {
        self.cache.status(now)
    }
}
