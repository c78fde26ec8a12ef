use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

const OPEN_METEO_URL: &str = "https://api.open-meteo.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions, temperature in whole degrees Fahrenheit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weather {
    pub temperature: i32,
    pub code: u16,
    pub is_day: bool,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Current {
    temperature_2m: f64,
    weather_code: u16,
    is_day: u8,
}

pub struct OpenMeteo {
    http: reqwest::Client,
    base_url: String,
}

impl OpenMeteo {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_base_url(OPEN_METEO_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn current(&self, location: Location, timezone: &str) -> Result<Weather, reqwest::Error> {
        let res: ForecastResponse = self
            .http
            .get(format!("{}/v1/forecast", self.base_url))
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", "temperature_2m,weather_code,is_day".to_string()),
                ("temperature_unit", "fahrenheit".to_string()),
                ("timezone", timezone.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Weather {
            temperature: res.current.temperature_2m.round_ties_even() as i32,
            code: res.current.weather_code,
            is_day: res.current.is_day != 0,
        })
    }
}

/// Current weather, or `None` when it cannot be fetched. Weather is decoration
/// only, so failures are logged and swallowed.
pub async fn fetch(client: &OpenMeteo, location: Location, timezone: &str) -> Option<Weather> {
    match client.current(location, timezone).await {
        Ok(weather) => {
            info!(
                "Weather: {}F, code {}, {}.",
                weather.temperature,
                weather.code,
                if weather.is_day { "day" } else { "night" }
            );
            Some(weather)
        }
        Err(err) => {
            warn!("Could not fetch weather: {}", err);
            None
        }
    }
}

/// Icon file under `assets/weather/` for a WMO weather code.
pub fn icon_name(code: u16, is_day: bool) -> &'static str {
    match (code, is_day) {
        (0, true) => "sunny.png",
        (0, false) => "clear-night.png",
        (1 | 2, true) => "partly-cloudy.png",
        (1 | 2, false) => "partly-cloudy-night.png",
        (3, _) => "cloudy.png",
        (45 | 48, _) => "humidity.png",
        (51 | 53 | 55 | 61 | 63, _) => "rain.png",
        (65 | 80 | 81 | 82, _) => "heavy_rain.png",
        (71 | 73 | 75 | 77 | 85 | 86, _) => "snow.png",
        (95 | 96 | 99, _) => "severe_thunderstorm.png",
        (_, true) => "sunny.png",
        (_, false) => "clear-night.png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::net::SocketAddr;

    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    const IRVINE: Location = Location {
        latitude: 33.6846,
        longitude: -117.8265,
    };

    fn spawn(app: Router) -> String {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let server = axum::Server::bind(&addr).serve(app.into_make_service());
        let addr = server.local_addr();

        tokio::spawn(async move {
            server.await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn maps_codes_to_icons() {
        assert_eq!(icon_name(0, true), "sunny.png");
        assert_eq!(icon_name(0, false), "clear-night.png");
        assert_eq!(icon_name(2, false), "partly-cloudy-night.png");
        assert_eq!(icon_name(3, false), "cloudy.png");
        assert_eq!(icon_name(48, true), "humidity.png");
        assert_eq!(icon_name(63, true), "rain.png");
        assert_eq!(icon_name(81, false), "heavy_rain.png");
        assert_eq!(icon_name(86, true), "snow.png");
        assert_eq!(icon_name(99, false), "severe_thunderstorm.png");
    }

    #[test]
    fn unknown_codes_fall_back_to_clear_sky() {
        assert_eq!(icon_name(57, true), "sunny.png");
        assert_eq!(icon_name(57, false), "clear-night.png");
    }

    #[tokio::test]
    async fn reads_current_conditions() {
        let app = Router::new().route(
            "/v1/forecast",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["temperature_unit"], "fahrenheit");
                assert_eq!(params["current"], "temperature_2m,weather_code,is_day");
                assert_eq!(params["timezone"], "America/Los_Angeles");
                Json(json!({
                    "latitude": 33.68,
                    "longitude": -117.83,
                    "current": {
                        "time": "2024-03-14T09:00",
                        "temperature_2m": 71.6,
                        "weather_code": 2,
                        "is_day": 1,
                    },
                }))
            }),
        );
        let client = OpenMeteo::with_base_url(&spawn(app)).unwrap();

        let weather = fetch(&client, IRVINE, "America/Los_Angeles").await;

        assert_eq!(
            weather,
            Some(Weather {
                temperature: 72,
                code: 2,
                is_day: true,
            })
        );
    }

    #[tokio::test]
    async fn failures_yield_no_weather() {
        let app = Router::new().route(
            "/v1/forecast",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let client = OpenMeteo::with_base_url(&spawn(app)).unwrap();

        assert_eq!(fetch(&client, IRVINE, "America/Los_Angeles").await, None);
    }
}
