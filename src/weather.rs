use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Number, Value};

use crate::error::{Result, WeatherChatError};
use crate::models::{CurrentWeather, ForecastDay, ForecastReport, Intent, Units, WeatherResult};
use crate::transport::truncate;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, intent: &Intent) -> Result<WeatherResult>;
}

/// WeatherAPI.com client.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(http: Client, base_url: String, api_key: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Endpoint path and query parameters for an intent.
    fn request_parts(&self, intent: &Intent) -> (String, Vec<(&'static str, String)>) {
        let mut params = vec![
            ("key", self.api_key.clone()),
            ("q", intent.location.clone()),
        ];
        let endpoint = match intent.timeframe.forecast_days() {
            None => "current.json",
            Some(days) => {
                params.push(("days", days.to_string()));
                "forecast.json"
            }
        };
        (format!("{}/{}", self.base_url, endpoint), params)
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn fetch(&self, intent: &Intent) -> Result<WeatherResult> {
        let (url, params) = self.request_parts(intent);

        tracing::info!(
            "[Weather] Fetching weather for: {} (units: {:?}, timeframe: {:?})",
            intent.location,
            intent.units,
            intent.timeframe
        );
        tracing::debug!(
            "[WeatherAPI Request] URL: {}?key={}&q={}",
            url,
            mask_key(&self.api_key),
            intent.location
        );

        let res = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| WeatherChatError::ProviderUnreachable(e.without_url().to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| WeatherChatError::ProviderUnreachable(e.without_url().to_string()))?;

        tracing::info!("[WeatherAPI Response] Status: {}", status.as_u16());

        if !status.is_success() {
            tracing::warn!(
                "[WeatherAPI Response] Error: HTTP {} - {}",
                status.as_u16(),
                truncate(&body, 100)
            );
            return Err(status_error(status, &intent.location));
        }

        let payload: WaPayload = serde_json::from_str(&body).map_err(|e| {
            WeatherChatError::InvalidProviderData(format!("response was not valid JSON ({e})"))
        })?;

        let result = normalize(payload, intent)?;
        tracing::info!("[Weather] Successfully fetched weather for {}", result.location());
        Ok(result)
    }
}

fn status_error(status: StatusCode, location: &str) -> WeatherChatError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
            WeatherChatError::LocationNotFound(location.to_string())
        }
        other => WeatherChatError::ProviderStatus {
            status: other.as_u16(),
        },
    }
}

#[derive(Debug, Deserialize)]
struct WaPayload {
    location: Option<WaLocation>,
    current: Option<WaCurrent>,
    forecast: Option<WaForecast>,
    error: Option<WaError>,
}

#[derive(Debug, Deserialize)]
struct WaError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: Option<Number>,
    temp_f: Option<Number>,
    wind_kph: Option<Number>,
    wind_mph: Option<Number>,
    humidity: Option<Number>,
    condition: Option<WaCondition>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    // Days stay untyped so one malformed day cannot fail the whole payload.
    forecastday: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: Option<String>,
    day: Option<WaDay>,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: Option<Number>,
    mintemp_c: Option<Number>,
    maxtemp_f: Option<Number>,
    mintemp_f: Option<Number>,
    condition: Option<WaCondition>,
}

fn normalize(payload: WaPayload, intent: &Intent) -> Result<WeatherResult> {
    if let Some(err) = payload.error {
        let message = err.message.unwrap_or_else(|| "Weather API error".to_string());
        tracing::warn!("[WeatherAPI Response] API Error: {}", message);
        return Err(WeatherChatError::ProviderReported(message));
    }

    let location = payload
        .location
        .as_ref()
        .and_then(display_location)
        .ok_or_else(|| {
            WeatherChatError::InvalidProviderData("missing location information".to_string())
        })?;

    if payload.current.is_none() && payload.forecast.is_none() {
        return Err(WeatherChatError::InvalidProviderData(
            "missing weather information".to_string(),
        ));
    }

    match intent.timeframe.forecast_days() {
        None => {
            let current = payload.current.ok_or_else(|| {
                WeatherChatError::InvalidProviderData("missing current conditions".to_string())
            })?;
            normalize_current(current, location, intent.units).map(WeatherResult::Current)
        }
        Some(_) => {
            let days = payload
                .forecast
                .and_then(|f| f.forecastday)
                .ok_or_else(|| {
                    WeatherChatError::NoForecastData(
                        "Forecast data not available for this location".to_string(),
                    )
                })?;
            normalize_forecast(days, location, intent.units).map(WeatherResult::Forecast)
        }
    }
}

fn display_location(loc: &WaLocation) -> Option<String> {
    let name = loc.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
    match loc.country.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(country) => Some(format!("{name}, {country}")),
        None => Some(name.to_string()),
    }
}

fn with_suffix(value: Option<&Number>, suffix: &str) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v}{suffix}"))
}

fn normalize_current(current: WaCurrent, location: String, units: Units) -> Result<CurrentWeather> {
    let (temp, wind) = match units {
        Units::Imperial => (current.temp_f.as_ref(), current.wind_mph.as_ref()),
        Units::Metric => (current.temp_c.as_ref(), current.wind_kph.as_ref()),
    };

    let humidity = current.humidity.clone().ok_or_else(|| {
        WeatherChatError::InvalidProviderData("missing humidity".to_string())
    })?;

    let condition = current
        .condition
        .and_then(|c| c.text)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "N/A".to_string());

    Ok(CurrentWeather {
        location,
        temperature: with_suffix(temp, units.temperature_suffix()),
        condition,
        humidity,
        wind: with_suffix(wind, &format!(" {}", units.wind_unit())),
    })
}

fn normalize_day(raw: Value, units: Units) -> std::result::Result<ForecastDay, String> {
    let parsed: WaForecastDay = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    let date = parsed.date.ok_or("date")?;
    let day = parsed.day.ok_or("day")?;
    let condition = day.condition.and_then(|c| c.text).ok_or("condition")?;
    let (high, low) = match units {
        Units::Imperial => (
            day.maxtemp_f.ok_or("maxtemp_f")?,
            day.mintemp_f.ok_or("mintemp_f")?,
        ),
        Units::Metric => (
            day.maxtemp_c.ok_or("maxtemp_c")?,
            day.mintemp_c.ok_or("mintemp_c")?,
        ),
    };
    let suffix = units.temperature_suffix();
    Ok(ForecastDay {
        date,
        condition,
        high: format!("{high}{suffix}"),
        low: format!("{low}{suffix}"),
    })
}

fn normalize_forecast(days: Vec<Value>, location: String, units: Units) -> Result<ForecastReport> {
    let mut forecast = Vec::with_capacity(days.len());
    for (idx, raw) in days.into_iter().enumerate() {
        match normalize_day(raw, units) {
            Ok(day) => forecast.push(day),
            Err(missing) => {
                tracing::warn!(
                    "[Weather] Skipping forecast day {}: missing or invalid {}",
                    idx,
                    missing
                );
            }
        }
    }

    if forecast.is_empty() {
        return Err(WeatherChatError::NoForecastData(
            "No valid forecast data available".to_string(),
        ));
    }

    tracing::info!("[Weather] Normalized {}-day forecast for {}", forecast.len(), location);
    Ok(ForecastReport { location, forecast })
}

/// First 8 and last 4 characters of a key; `***` for short keys.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timeframe;
    use serde_json::json;

    fn intent(units: Units, timeframe: Timeframe) -> Intent {
        Intent {
            location: "Paris".to_string(),
            units,
            timeframe,
        }
    }

    fn payload(value: Value) -> WaPayload {
        serde_json::from_value(value).expect("payload shape")
    }

    fn day(date: &str, max_c: f64, min_c: f64) -> Value {
        json!({
            "date": date,
            "day": {
                "maxtemp_c": max_c, "mintemp_c": min_c,
                "maxtemp_f": 70.2, "mintemp_f": 50.0,
                "condition": { "text": "Partly cloudy" }
            }
        })
    }

    #[test]
    fn request_parts_select_endpoint() {
        let provider = WeatherApiProvider::new(
            Client::new(),
            "http://api.weatherapi.com/v1/".to_string(),
            "KEY".to_string(),
        );

        let (url, params) = provider.request_parts(&intent(Units::Metric, Timeframe::Today));
        assert_eq!(url, "http://api.weatherapi.com/v1/current.json");
        assert!(!params.iter().any(|(k, _)| *k == "days"));

        let (url, params) = provider.request_parts(&intent(Units::Metric, Timeframe::Week));
        assert_eq!(url, "http://api.weatherapi.com/v1/forecast.json");
        assert!(params.contains(&("days", "7".to_string())));

        let (_, params) = provider.request_parts(&intent(Units::Metric, Timeframe::Tomorrow));
        assert!(params.contains(&("days", "3".to_string())));
    }

    #[test]
    fn current_metric_values_are_verbatim() {
        let result = normalize(
            payload(json!({
                "location": { "name": "Paris", "country": "France" },
                "current": {
                    "temp_c": 18.0, "temp_f": 64.4,
                    "wind_kph": 11.2, "wind_mph": 6.9,
                    "humidity": 40,
                    "condition": { "text": "Sunny" }
                }
            })),
            &intent(Units::Metric, Timeframe::Now),
        )
        .unwrap();

        let WeatherResult::Current(c) = result else {
            panic!("expected current weather");
        };
        assert_eq!(c.location, "Paris, France");
        assert_eq!(c.temperature, "18.0°C");
        assert_eq!(c.wind, "11.2 kph");
        assert_eq!(c.humidity, Number::from(40));
        assert_eq!(c.condition, "Sunny");
    }

    #[test]
    fn current_imperial_uses_fahrenheit_fields() {
        let result = normalize(
            payload(json!({
                "location": { "name": "Denver", "country": "USA" },
                "current": {
                    "temp_c": 10.0, "temp_f": 50.0,
                    "wind_kph": 16.1, "wind_mph": 10.0,
                    "humidity": 20,
                    "condition": { "text": "Clear" }
                }
            })),
            &intent(Units::Imperial, Timeframe::Now),
        )
        .unwrap();

        let WeatherResult::Current(c) = result else {
            panic!("expected current weather");
        };
        assert_eq!(c.temperature, "50.0°F");
        assert_eq!(c.wind, "10.0 mph");
    }

    #[test]
    fn missing_temperature_is_not_available() {
        let result = normalize(
            payload(json!({
                "location": { "name": "Paris", "country": "France" },
                "current": { "humidity": 40, "condition": { "text": "Sunny" } }
            })),
            &intent(Units::Metric, Timeframe::Now),
        )
        .unwrap();
        let WeatherResult::Current(c) = result else {
            panic!("expected current weather");
        };
        assert_eq!(c.temperature, "N/A");
        assert_eq!(c.wind, "N/A");
    }

    #[test]
    fn missing_location_is_invalid() {
        let err = normalize(
            payload(json!({ "current": { "humidity": 1 } })),
            &intent(Units::Metric, Timeframe::Now),
        )
        .unwrap_err();
        assert!(matches!(err, WeatherChatError::InvalidProviderData(_)));
    }

    #[test]
    fn missing_both_sections_is_invalid() {
        let err = normalize(
            payload(json!({ "location": { "name": "Paris", "country": "France" } })),
            &intent(Units::Metric, Timeframe::Week),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing weather information"));
    }

    #[test]
    fn provider_reported_error() {
        let err = normalize(
            payload(json!({ "error": { "code": 2008, "message": "API key has been disabled." } })),
            &intent(Units::Metric, Timeframe::Now),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Weather API error: API key has been disabled.");
    }

    #[test]
    fn forecast_skips_malformed_days() {
        let mut days: Vec<Value> = (1..=5)
            .map(|d| day(&format!("2026-10-{:02}", 19 + d), 20.0, 10.0))
            .collect();
        days.insert(1, json!({ "date": "2026-10-21", "day": { "condition": { "text": "Rain" } } }));
        days.push(json!({ "day": "not an object" }));

        let result = normalize(
            payload(json!({
                "location": { "name": "Paris", "country": "France" },
                "current": { "humidity": 40 },
                "forecast": { "forecastday": days }
            })),
            &intent(Units::Metric, Timeframe::Week),
        )
        .unwrap();

        let WeatherResult::Forecast(f) = result else {
            panic!("expected forecast");
        };
        assert_eq!(f.forecast.len(), 5);
        assert_eq!(f.forecast[0].high, "20.0°C");
        assert_eq!(f.forecast[0].low, "10.0°C");
    }

    #[test]
    fn forecast_with_no_valid_days() {
        let err = normalize(
            payload(json!({
                "location": { "name": "Paris", "country": "France" },
                "forecast": { "forecastday": [ { "date": "2026-10-20" } ] }
            })),
            &intent(Units::Metric, Timeframe::Tomorrow),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "No valid forecast data available");
    }

    #[test]
    fn forecast_section_missing() {
        let err = normalize(
            payload(json!({
                "location": { "name": "Paris", "country": "France" },
                "current": { "humidity": 40 }
            })),
            &intent(Units::Metric, Timeframe::Tomorrow),
        )
        .unwrap_err();
        assert!(matches!(err, WeatherChatError::NoForecastData(_)));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "Atlantis"),
            WeatherChatError::LocationNotFound(ref l) if l == "Atlantis"
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "Paris"),
            WeatherChatError::ProviderStatus { status: 403 }
        ));
    }

    #[test]
    fn key_masking() {
        assert_eq!(mask_key("abcdefgh12345678"), "abcdefgh...5678");
        assert_eq!(mask_key("short"), "***");
    }
}
