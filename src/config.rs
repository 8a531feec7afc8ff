use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// One entry of the city list. `name` is only a fallback, the provider's
/// own city name wins when it sends one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityConfig {
    #[serde(rename = "CityCode", deserialize_with = "de_city_code")]
    pub id: String,
    #[serde(rename = "CityName", default)]
    pub name: String,
}

impl CityConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// City files in the wild carry the code either as a JSON string or a number.
fn de_city_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(u64),
    }

    match Code::deserialize(deserializer)? {
        Code::Text(s) => Ok(s.trim().to_string()),
        Code::Number(n) => Ok(n.to_string()),
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub openweather_current_path: String,
    pub openweather_units: String,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub fetch_concurrency: usize,
    pub single_flight: bool,
    pub bind_addr: String,
    pub cities: Arc<[CityConfig]>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key/value source. `from_env` passes the
    /// process environment.
    pub fn from_lookup<L>(lookup: L) -> anyhow::Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let cities_file = var("CITIES_FILE", "cities.json");
        let cities = load_cities(Path::new(&cities_file))?;

        let cache_ttl_secs: u64 = parse_var(&lookup, "CACHE_TTL_SECS", 300)?;
        let fetch_timeout_secs: u64 = parse_var(&lookup, "FETCH_TIMEOUT_SECS", 10)?;
        let fetch_concurrency: usize = parse_var(&lookup, "FETCH_CONCURRENCY", cities.len())?;
        validate_limits(cache_ttl_secs, fetch_timeout_secs, fetch_concurrency)?;

        Ok(Config {
            openweather_api_key: lookup("OPENWEATHER_API_KEY")
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("OPENWEATHER_API_KEY not set"))?,
            openweather_base_url: var("OPENWEATHER_BASE_URL", "https://api.openweathermap.org"),
            openweather_current_path: var("OPENWEATHER_CURRENT_PATH", "/data/2.5/weather"),
            openweather_units: var("OPENWEATHER_UNITS", "metric"),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            fetch_concurrency,
            single_flight: parse_var(&lookup, "SINGLE_FLIGHT", true)?,
            bind_addr: var("BIND_ADDR", "0.0.0.0:5001"),
            cities,
        })
    }
}

fn validate_limits(
    cache_ttl_secs: u64,
    fetch_timeout_secs: u64,
    fetch_concurrency: usize,
) -> anyhow::Result<()> {
    if cache_ttl_secs == 0 {
        anyhow::bail!("CACHE_TTL_SECS must be greater than zero");
    }
    if fetch_timeout_secs == 0 {
        anyhow::bail!("FETCH_TIMEOUT_SECS must be greater than zero");
    }
    if fetch_concurrency == 0 {
        anyhow::bail!("FETCH_CONCURRENCY must be at least 1");
    }
    Ok(())
}

fn parse_var<L, T>(lookup: &L, key: &str, default: T) -> anyhow::Result<T>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

/// Load the ordered city list. The order is kept as-is, it decides ties
/// when two cities end up with the same comfort score.
pub fn load_cities(path: &Path) -> anyhow::Result<Arc<[CityConfig]>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read city list {}", path.display()))?;
    parse_cities(&raw).with_context(|| format!("invalid city list {}", path.display()))
}

pub fn parse_cities(raw: &str) -> anyhow::Result<Arc<[CityConfig]>> {
    let cities: Vec<CityConfig> = serde_json::from_str(raw)?;

    if cities.is_empty() {
        anyhow::bail!("city list is empty");
    }

    let mut seen = HashSet::new();
    for city in &cities {
        if city.id.is_empty() {
            anyhow::bail!("city {:?} has an empty CityCode", city.name);
        }
        if !seen.insert(city.id.as_str()) {
            anyhow::bail!("duplicate CityCode {}", city.id);
        }
    }

    Ok(cities.into())
}
