use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::CityConfig;
use crate::scoring::comfort_score;
use crate::weather::types::{Observation, ScoredCity};
use crate::weather::{CityFetcher, FetchError};

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("aggregation failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("aggregation failed: fetch task for city {city_id} did not complete: {reason}")]
    TaskFailed { city_id: String, reason: String },
}

/// Fetches every configured city, scores and ranks them.
pub struct Aggregator<F> {
    fetcher: Arc<F>,
    cities: Arc<[CityConfig]>,
    concurrency: usize,
}

impl<F: CityFetcher> Aggregator<F> {
    pub fn new(fetcher: Arc<F>, cities: Arc<[CityConfig]>, concurrency: usize) -> Self {
        Self {
            fetcher,
            cities,
            concurrency: concurrency.max(1),
        }
    }

    pub fn cities(&self) -> &[CityConfig] {
        &self.cities
    }

    /// One full refresh. Either every city is fetched and the ranked list is
    /// returned, or the whole run fails with the first failing city in
    /// configured order.
    pub async fn refresh(&self) -> Result<Vec<ScoredCity>, AggregationError> {
        let started = Instant::now();
        tracing::info!(cities = self.cities.len(), "Refreshing city weather");

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, city) in self.cities.iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquiring a permit cannot fail.
                let _permit = permits.acquire_owned().await.ok();
                (index, fetcher.fetch(&city).await)
            });
        }

        let mut outcomes: Vec<Option<Result<Observation, FetchError>>> =
            (0..self.cities.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => {
                    tracing::error!("Fetch task failed: {}", e);
                }
            }
        }

        let mut observations = Vec::with_capacity(outcomes.len());
        for (city, outcome) in self.cities.iter().zip(outcomes) {
            match outcome {
                Some(Ok(observation)) => observations.push(observation),
                Some(Err(e)) => {
                    tracing::warn!(
                        city_id = %e.city_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Refresh aborted: {}",
                        e
                    );
                    return Err(e.into());
                }
                None => {
                    return Err(AggregationError::TaskFailed {
                        city_id: city.id.clone(),
                        reason: "task panicked or was cancelled".to_string(),
                    });
                }
            }
        }

        let ranked = rank(observations);
        tracing::info!(
            cities = ranked.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refresh complete"
        );
        Ok(ranked)
    }
}

/// Score and rank. Sorting is stable, so equal scores keep input order.
pub fn rank(observations: Vec<Observation>) -> Vec<ScoredCity> {
    let mut scored: Vec<(u8, Observation)> = observations
        .into_iter()
        .map(|o| (comfort_score(o.temp, o.humidity, o.wind_speed), o))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .zip(1u32..)
        .map(|((comfort_score, observation), rank)| ScoredCity {
            observation,
            comfort_score,
            rank,
        })
        .collect()
}
