use chrono::Utc;
use serde::{Deserialize, Serialize};

// Workers AI chat message format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// Workers AI run request format
#[derive(Debug, Serialize, Clone)]
pub struct WorkersAiRequest {
    pub messages: Vec<ChatMessage>,
}

// Workers AI run response envelope
#[derive(Debug, Deserialize, Default)]
pub struct WorkersAiResponse {
    #[serde(default)]
    pub success: bool,
    pub result: Option<WorkersAiResult>,
    #[serde(default)]
    pub errors: Vec<WorkersAiMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WorkersAiResult {
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkersAiMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Measurement system requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl From<String> for Units {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("imperial") {
            Units::Imperial
        } else {
            Units::Metric
        }
    }
}

impl Units {
    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn wind_unit(&self) -> &'static str {
        match self {
            Units::Metric => "kph",
            Units::Imperial => "mph",
        }
    }
}

/// When the user wants the weather for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String")]
pub enum Timeframe {
    #[default]
    #[serde(rename = "now")]
    Now,
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "tomorrow")]
    Tomorrow,
    #[serde(rename = "7d")]
    Week,
}

impl From<String> for Timeframe {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "now" => Timeframe::Now,
            "today" => Timeframe::Today,
            "tomorrow" => Timeframe::Tomorrow,
            "7d" => Timeframe::Week,
            other => {
                // Anything else still takes the provider's forecast branch.
                tracing::warn!("Unrecognised timeframe '{}', using short forecast", other);
                Timeframe::Tomorrow
            }
        }
    }
}

impl Timeframe {
    /// Forecast depth in days, or `None` when current conditions are wanted.
    pub fn forecast_days(&self) -> Option<u8> {
        match self {
            Timeframe::Now | Timeframe::Today => None,
            Timeframe::Week => Some(7),
            Timeframe::Tomorrow => Some(3),
        }
    }
}

/// A validated `get_weather` intent. Only [`crate::intent`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub location: String,
    pub units: Units,
    pub timeframe: Timeframe,
}

/// Point-in-time conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub location: String,
    pub temperature: String,
    pub condition: String,
    pub humidity: serde_json::Number,
    pub wind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub condition: String,
    pub high: String,
    pub low: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub location: String,
    pub forecast: Vec<ForecastDay>,
}

/// Normalized provider result: exactly one of the two canonical shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeatherResult {
    Current(CurrentWeather),
    Forecast(ForecastReport),
}

impl WeatherResult {
    pub fn location(&self) -> &str {
        match self {
            WeatherResult::Current(c) => &c.location,
            WeatherResult::Forecast(f) => &f.location,
        }
    }

    pub fn kind(&self) -> ResultKind {
        match self {
            WeatherResult::Current(_) => ResultKind::Current,
            WeatherResult::Forecast(_) => ResultKind::Forecast,
        }
    }

    /// Condition and temperature text handed to the embellisher.
    pub fn headline(&self) -> (String, String) {
        match self {
            WeatherResult::Current(c) => (c.condition.clone(), c.temperature.clone()),
            WeatherResult::Forecast(f) => match f.forecast.first() {
                Some(day) => (day.condition.clone(), format!("{} to {}", day.low, day.high)),
                None => (
                    "unknown weather".to_string(),
                    "unknown temperature".to_string(),
                ),
            },
        }
    }
}

/// Success payload of `POST /chat`. `limerick` is always serialized, `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReply {
    #[serde(flatten)]
    pub weather: WeatherResult,
    pub limerick: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Current,
    Forecast,
}

/// One remembered query, stored in the history blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub location: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: ResultKind,
}

impl HistoryEntry {
    /// Create an entry stamped with the current UTC time
    pub fn new(query: String, location: String, kind: ResultKind) -> Self {
        Self {
            query,
            location,
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            kind,
        }
    }
}

/// Body of `POST /chat`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: String,
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> WeatherResult {
        WeatherResult::Current(CurrentWeather {
            location: "Paris, France".to_string(),
            temperature: "18.0°C".to_string(),
            condition: "Sunny".to_string(),
            humidity: 40.into(),
            wind: "11.2 kph".to_string(),
        })
    }

    #[test]
    fn units_fall_back_to_metric() {
        assert_eq!(Units::from("imperial".to_string()), Units::Imperial);
        assert_eq!(Units::from("Imperial".to_string()), Units::Imperial);
        assert_eq!(Units::from("kelvin".to_string()), Units::Metric);
        assert_eq!(Units::Imperial.temperature_suffix(), "°F");
        assert_eq!(Units::Metric.wind_unit(), "kph");
    }

    #[test]
    fn timeframe_forecast_depth() {
        assert_eq!(Timeframe::Now.forecast_days(), None);
        assert_eq!(Timeframe::Today.forecast_days(), None);
        assert_eq!(Timeframe::Tomorrow.forecast_days(), Some(3));
        assert_eq!(Timeframe::Week.forecast_days(), Some(7));
        assert_eq!(Timeframe::from("next week".to_string()), Timeframe::Tomorrow);
    }

    #[test]
    fn timeframe_serializes_with_wire_names() {
        assert_eq!(serde_json::to_string(&Timeframe::Week).unwrap(), "\"7d\"");
        let parsed: Timeframe = serde_json::from_str("\"7d\"").unwrap();
        assert_eq!(parsed, Timeframe::Week);
    }

    #[test]
    fn reply_always_carries_limerick_key() {
        let reply = WeatherReply {
            weather: current(),
            limerick: None,
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["location"], "Paris, France");
        assert_eq!(value["humidity"], 40);
        assert!(value.get("limerick").is_some());
        assert!(value["limerick"].is_null());
        assert!(value.get("forecast").is_none());
    }

    #[test]
    fn forecast_headline_uses_first_day() {
        let result = WeatherResult::Forecast(ForecastReport {
            location: "Oslo, Norway".to_string(),
            forecast: vec![ForecastDay {
                date: "2026-10-20".to_string(),
                condition: "Snow".to_string(),
                high: "1.0°C".to_string(),
                low: "-4.0°C".to_string(),
            }],
        });
        let (condition, temperature) = result.headline();
        assert_eq!(condition, "Snow");
        assert_eq!(temperature, "-4.0°C to 1.0°C");
        assert_eq!(result.kind(), ResultKind::Forecast);
    }

    #[test]
    fn history_entry_uses_type_key() {
        let entry = HistoryEntry::new(
            "weather in Paris".to_string(),
            "Paris, France".to_string(),
            ResultKind::Current,
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "current");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
