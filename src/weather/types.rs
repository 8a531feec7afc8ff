use serde::{Deserialize, Serialize};

/// Current conditions for one city as served by `/data/2.5/weather`.
/// Only the fields the ranking needs are modelled, the rest is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeatherResponse {
    pub name: String,
    pub main: CurrentMain,
    pub wind: CurrentWind,
    pub weather: Vec<CurrentCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentMain {
    pub temp: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWind {
    pub speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentCondition {
    pub description: String,
}

/// Raw reading for one city, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub city: String,
    pub temp: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub description: String,
}

/// An observation with its comfort score and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCity {
    #[serde(flatten)]
    pub observation: Observation,
    pub comfort_score: u8,
    pub rank: u32,
}
