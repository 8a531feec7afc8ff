use super::types::*;
use super::{CityFetcher, FetchError};
use crate::config::{CityConfig, Config};
use reqwest::Client;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenWeatherError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP request failed: {0}")]
    RequestFailed(reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for OpenWeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OpenWeatherError::Timeout
        } else {
            // The request URL carries the appid, keep it out of messages.
            OpenWeatherError::RequestFailed(err.without_url())
        }
    }
}

pub struct OpenWeatherClient {
    client: Client,
    url: String,
    api_key: String,
    units: String,
}

impl OpenWeatherClient {
    pub fn new(config: &Config) -> Result<Self, OpenWeatherError> {
        let client = Client::builder()
            .user_agent(concat!("CityComfort/", env!("CARGO_PKG_VERSION")))
            .timeout(config.fetch_timeout)
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}{}",
                config.openweather_base_url.trim_end_matches('/'),
                config.openweather_current_path
            ),
            api_key: config.openweather_api_key.clone(),
            units: config.openweather_units.clone(),
        })
    }

    pub async fn get_current(&self, city_id: &str) -> Result<CurrentWeatherResponse, OpenWeatherError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("id", city_id),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OpenWeatherError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let current: CurrentWeatherResponse = serde_json::from_slice(&body)?;
        Ok(current)
    }
}

impl CityFetcher for OpenWeatherClient {
    async fn fetch(&self, city: &CityConfig) -> Result<Observation, FetchError> {
        tracing::debug!(city_id = %city.id, "Fetching current weather");

        self.get_current(&city.id)
            .await
            .and_then(|current| current.into_observation(&city.name))
            .map_err(|source| FetchError {
                city_id: city.id.clone(),
                source,
            })
    }
}

impl CurrentWeatherResponse {
    /// Flatten into an `Observation`. An empty provider name falls back to
    /// the configured one.
    pub fn into_observation(self, fallback_name: &str) -> Result<Observation, OpenWeatherError> {
        let description = self
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| OpenWeatherError::Malformed("empty weather array".to_string()))?;

        let city = if self.name.trim().is_empty() {
            fallback_name.to_string()
        } else {
            self.name
        };

        Ok(Observation {
            city,
            temp: self.main.temp,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str, timeout: Duration) -> Config {
        Config {
            openweather_api_key: "test_key".to_string(),
            openweather_base_url: base_url.to_string(),
            openweather_current_path: "/data/2.5/weather".to_string(),
            openweather_units: "metric".to_string(),
            cache_ttl: Duration::from_secs(300),
            fetch_timeout: timeout,
            fetch_concurrency: 4,
            single_flight: true,
            bind_addr: "127.0.0.1:0".to_string(),
            cities: Arc::from(vec![CityConfig::new("1248991", "Colombo")]),
        }
    }

    fn colombo_body() -> serde_json::Value {
        serde_json::json!({
            "coord": {"lon": 79.85, "lat": 6.93},
            "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}],
            "main": {"temp": 30.5, "feels_like": 36.1, "pressure": 1009, "humidity": 70},
            "wind": {"speed": 4.1, "deg": 250},
            "name": "Colombo",
            "cod": 200
        })
    }

    #[tokio::test]
    async fn test_fetch_parses_observation() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("id", "1248991"))
            .and(query_param("appid", "test_key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(colombo_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = test_config(&mock_server.uri(), Duration::from_secs(5));
        let client = OpenWeatherClient::new(&config).unwrap();
        let obs = client
            .fetch(&CityConfig::new("1248991", "Colombo"))
            .await
            .unwrap();

        assert_eq!(obs.city, "Colombo");
        assert_eq!(obs.temp, 30.5);
        assert_eq!(obs.humidity, 70.0);
        assert_eq!(obs.wind_speed, 4.1);
        assert_eq!(obs.description, "broken clouds");
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_configured_name() {
        let mock_server = MockServer::start().await;
        let mut body = colombo_body();
        body["name"] = serde_json::json!("");

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let config = test_config(&mock_server.uri(), Duration::from_secs(5));
        let client = OpenWeatherClient::new(&config).unwrap();
        let obs = client
            .fetch(&CityConfig::new("1248991", "Colombo (configured)"))
            .await
            .unwrap();

        assert_eq!(obs.city, "Colombo (configured)");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = test_config(&mock_server.uri(), Duration::from_secs(5));
        let client = OpenWeatherClient::new(&config).unwrap();
        let err = client
            .fetch(&CityConfig::new("42", "Nowhere"))
            .await
            .unwrap_err();

        assert_eq!(err.city_id, "42");
        match err.source {
            OpenWeatherError::Status { status, ref body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Invalid API key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_missing_field() {
        let mock_server = MockServer::start().await;
        let mut body = colombo_body();
        body["main"] = serde_json::json!({"temp": 30.5});

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let config = test_config(&mock_server.uri(), Duration::from_secs(5));
        let client = OpenWeatherClient::new(&config).unwrap();
        let err = client
            .fetch(&CityConfig::new("1248991", "Colombo"))
            .await
            .unwrap_err();

        assert!(matches!(err.source, OpenWeatherError::JsonParsing(_)));
    }

    #[tokio::test]
    async fn test_fetch_empty_weather_array() {
        let mock_server = MockServer::start().await;
        let mut body = colombo_body();
        body["weather"] = serde_json::json!([]);

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let config = test_config(&mock_server.uri(), Duration::from_secs(5));
        let client = OpenWeatherClient::new(&config).unwrap();
        let err = client
            .fetch(&CityConfig::new("1248991", "Colombo"))
            .await
            .unwrap_err();

        assert!(matches!(err.source, OpenWeatherError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(colombo_body())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let config = test_config(&mock_server.uri(), Duration::from_millis(200));
        let client = OpenWeatherClient::new(&config).unwrap();
        let err = client
            .fetch(&CityConfig::new("1248991", "Colombo"))
            .await
            .unwrap_err();

        assert!(matches!(err.source, OpenWeatherError::Timeout));
    }

    #[tokio::test]
    async fn test_connection_error_hides_api_key() {
        let mut config = test_config("http://127.0.0.1:1", Duration::from_secs(2));
        config.openweather_api_key = "SECRET_KEY_123".to_string();
        let client = OpenWeatherClient::new(&config).unwrap();

        let err = client
            .fetch(&CityConfig::new("1248991", "Colombo"))
            .await
            .unwrap_err();

        assert!(matches!(err.source, OpenWeatherError::RequestFailed(_)));
        let mut messages = vec![err.to_string(), format!("{err:?}")];
        let mut cause: Option<&dyn std::error::Error> = std::error::Error::source(&err);
        while let Some(e) = cause {
            messages.push(e.to_string());
            cause = e.source();
        }
        for message in messages {
            assert!(!message.contains("SECRET_KEY_123"), "key in {message}");
        }
    }
}
