use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeatherChatError>;

/// Why an intent could not be produced from the user's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentFailure {
    /// The model endpoint failed, timed out or answered with an error envelope.
    Upstream,
    /// The reply had no `{...}` span or the span was not valid JSON.
    Malformed,
    /// Valid JSON, but not a `get_weather` intent with a usable location.
    Unrecognized,
}

#[derive(Debug, Error)]
pub enum WeatherChatError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Intent parsing failed ({kind:?}): {detail}")]
    IntentParse { kind: IntentFailure, detail: String },

    #[error("Location '{0}' not found. Please check the spelling or try a different location.")]
    LocationNotFound(String),

    #[error("Weather API error (HTTP {status}): Unable to fetch weather data")]
    ProviderStatus { status: u16 },

    #[error("Weather API error: {0}")]
    ProviderReported(String),

    #[error("Weather API request failed: {0}")]
    ProviderUnreachable(String),

    #[error("Invalid weather data received: {0}")]
    InvalidProviderData(String),

    #[error("{0}")]
    NoForecastData(String),

    #[error("Key-value store error: {0}")]
    Kv(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WeatherChatError {
    pub fn intent(kind: IntentFailure, detail: impl Into<String>) -> Self {
        Self::IntentParse {
            kind,
            detail: detail.into(),
        }
    }

    /// True for every error raised by the weather provider stage.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::LocationNotFound(_)
                | Self::ProviderStatus { .. }
                | Self::ProviderReported(_)
                | Self::ProviderUnreachable(_)
                | Self::InvalidProviderData(_)
                | Self::NoForecastData(_)
        )
    }
}

impl From<redis::RedisError> for WeatherChatError {
    fn from(e: redis::RedisError) -> Self {
        Self::Kv(e.to_string())
    }
}

impl From<deadpool_redis::PoolError> for WeatherChatError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        Self::Kv(format!("connection pool: {e}"))
    }
}
