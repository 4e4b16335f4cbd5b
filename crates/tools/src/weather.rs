//! Weather tool: current conditions for a named location.
//!
//! A lookup is two steps: resolve the place name to coordinates, then fetch
//! current conditions for those coordinates. Both steps sit behind traits so
//! the plugin can be driven by stubs in tests; [`OpenMeteoClient`] implements
//! both against the public Open-Meteo APIs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ragent_config::ToolsConfig;
use ragent_core::tool::{Plugin, ToolCallResult, ToolDefinition, ToolKind};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::json_number;
use crate::math::js_round;

/// The uniform failure text for any lookup problem.
pub const WEATHER_UNAVAILABLE: &str = "Weather data unavailable";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeatherError {
    #[error("location not found: {0}")]
    LocationNotFound(String),

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Conditions as reported by the weather service, before presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Degrees Celsius.
    pub temperature: f64,
    /// WMO weather interpretation code.
    pub weather_code: i64,
    /// km/h.
    pub wind_speed: f64,
    /// Relative humidity in percent, when the service provides it.
    pub humidity: Option<f64>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, location: &str) -> Result<Coordinates, WeatherError>;
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn current(&self, at: Coordinates) -> Result<CurrentConditions, WeatherError>;
}

/// Human-readable text for a WMO weather code.
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 => "fog",
        48 => "depositing rime fog",
        51 => "light drizzle",
        53 => "moderate drizzle",
        55 => "dense drizzle",
        61 => "slight rain",
        63 => "moderate rain",
        65 => "heavy rain",
        71 => "slight snow fall",
        73 => "moderate snow fall",
        75 => "heavy snow fall",
        80 => "slight rain showers",
        81 => "moderate rain showers",
        82 => "violent rain showers",
        95 => "thunderstorm",
        96 => "thunderstorm with slight hail",
        99 => "thunderstorm with heavy hail",
        _ => "unknown conditions",
    }
}

// ── Open-Meteo client ─────────────────────────────────────────────────────

/// HTTP client for the Open-Meteo geocoding and forecast endpoints.
pub struct OpenMeteoClient {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

#[derive(Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
    #[serde(default)]
    hourly: Option<Hourly>,
}

#[derive(Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: i64,
}

#[derive(Deserialize)]
struct Hourly {
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
}

impl OpenMeteoClient {
    pub fn new(
        geocoding_url: impl Into<String>,
        forecast_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::Http(e.to_string()))?;
        Ok(Self {
            client,
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
        })
    }

    /// Build from the `[tools]` config section.
    pub fn from_config(config: &ToolsConfig) -> Result<Self, WeatherError> {
        Self::new(
            config.geocoding_api_url.as_str(),
            config.weather_api_url.as_str(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        service: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, WeatherError> {
        let response = request
            .send()
            .await
            .map_err(|e| WeatherError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status {
                service,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WeatherError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for OpenMeteoClient {
    async fn locate(&self, location: &str) -> Result<Coordinates, WeatherError> {
        let request = self.client.get(&self.geocoding_url).query(&[
            ("name", location),
            ("count", "1"),
            ("language", "en"),
            ("format", "json"),
        ]);
        let body: GeocodingResponse = self.get_json("geocoding", request).await?;

        body.results
            .first()
            .map(|r| Coordinates {
                latitude: r.latitude,
                longitude: r.longitude,
            })
            .ok_or_else(|| WeatherError::LocationNotFound(location.to_string()))
    }
}

#[async_trait]
impl WeatherService for OpenMeteoClient {
    async fn current(&self, at: Coordinates) -> Result<CurrentConditions, WeatherError> {
        let latitude = at.latitude.to_string();
        let longitude = at.longitude.to_string();
        let request = self.client.get(&self.forecast_url).query(&[
            ("latitude", latitude.as_str()),
            ("longitude", longitude.as_str()),
            ("current_weather", "true"),
            ("hourly", "relative_humidity_2m,wind_speed_10m"),
            ("timezone", "auto"),
        ]);
        let body: ForecastResponse = self.get_json("forecast", request).await?;

        Ok(CurrentConditions {
            temperature: body.current_weather.temperature,
            weather_code: body.current_weather.weathercode,
            wind_speed: body.current_weather.windspeed,
            humidity: body
                .hourly
                .and_then(|h| h.relative_humidity_2m.first().copied().flatten()),
        })
    }
}

// ── Plugin ────────────────────────────────────────────────────────────────

pub struct WeatherPlugin {
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherService>,
}

impl WeatherPlugin {
    pub fn new(geocoder: Arc<dyn Geocoder>, weather: Arc<dyn WeatherService>) -> Self {
        Self { geocoder, weather }
    }

    /// A plugin backed by one Open-Meteo client for both lookups.
    pub fn open_meteo(client: OpenMeteoClient) -> Self {
        let client = Arc::new(client);
        Self::new(client.clone(), client)
    }

    async fn lookup(&self, location: &str) -> Result<serde_json::Value, WeatherError> {
        let at = self.geocoder.locate(location).await?;
        debug!(location, lat = at.latitude, lon = at.longitude, "Resolved location");
        let conditions = self.weather.current(at).await?;
        Ok(present(&conditions))
    }
}

fn present(conditions: &CurrentConditions) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    out.insert(
        "temperature".into(),
        json_number(js_round(conditions.temperature)),
    );
    out.insert(
        "description".into(),
        describe_weather_code(conditions.weather_code).into(),
    );
    if let Some(humidity) = conditions.humidity {
        out.insert("humidity".into(), json_number(humidity));
    }
    out.insert(
        "windSpeed".into(),
        json_number(js_round(conditions.wind_speed * 10.0) / 10.0),
    );
    serde_json::Value::Object(out)
}

#[async_trait]
impl Plugin for WeatherPlugin {
    fn kind(&self) -> ToolKind {
        ToolKind::Weather
    }

    fn tool_details(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Get current weather for a location".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "Location to get weather for"
                    }
                },
                "required": ["location"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> ToolCallResult {
        let Some(location) = input.get("location").and_then(|v| v.as_str()) else {
            return ToolCallResult::failure(
                self.name(),
                input.clone(),
                "invalid input: missing 'location' string",
            );
        };

        match self.lookup(location).await {
            Ok(output) => ToolCallResult::success(self.name(), input.clone(), output),
            Err(e) => {
                warn!(location, error = %e, "Weather lookup failed");
                ToolCallResult::failure(self.name(), input.clone(), WEATHER_UNAVAILABLE)
            }
        }
    }
}
