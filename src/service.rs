use axum::http::StatusCode;
use reqwest::Client;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{IntentFailure, Result, WeatherChatError};
use crate::history::HistoryStore;
use crate::intent::{IntentParser, WorkersAiIntent};
use crate::limerick::{Embellisher, WorkersAiLimerick};
use crate::models::{ErrorBody, HistoryEntry, WeatherReply};
use crate::transport::{Transport, WorkersAiTransport};
use crate::weather::{WeatherApiProvider, WeatherProvider};

/// Where a `/chat` request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Parsing,
    Fetching,
    Enriching,
    Persisting,
    Responded,
}

/// Upstream collaborators; only present when every credential is configured.
#[derive(Clone)]
pub struct Backends {
    pub parser: Arc<dyn IntentParser>,
    pub provider: Arc<dyn WeatherProvider>,
    pub embellisher: Arc<dyn Embellisher>,
}

impl Backends {
    pub fn from_config(config: &Config) -> Result<Self> {
        let creds = config.credentials()?;

        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| WeatherChatError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let transport: Arc<dyn Transport> = Arc::new(WorkersAiTransport::from_config(
            http.clone(),
            config,
            creds.account_id,
            creds.api_token,
        ));

        Ok(Self {
            parser: Arc::new(WorkersAiIntent::new(
                Arc::clone(&transport),
                config.workers_ai.intent_model.clone(),
            )),
            provider: Arc::new(WeatherApiProvider::new(
                http,
                config.weather_api.base_url.clone(),
                creds.weather_api_key,
            )),
            embellisher: Arc::new(WorkersAiLimerick::new(
                transport,
                config.workers_ai.limerick_model.clone(),
            )),
        })
    }
}

/// Runs a chat query through parse, fetch, embellish and persist, and owns the
/// mapping from pipeline errors to HTTP responses.
#[derive(Clone)]
pub struct ChatService {
    backends: Option<Backends>,
    history: Arc<HistoryStore>,
}

impl ChatService {
    pub fn new(backends: Backends, history: Arc<HistoryStore>) -> Self {
        Self {
            backends: Some(backends),
            history,
        }
    }

    /// A service whose `/chat` always fails with a configuration error.
    pub fn unconfigured(history: Arc<HistoryStore>) -> Self {
        Self {
            backends: None,
            history,
        }
    }

    pub fn from_config(config: &Config, history: Arc<HistoryStore>) -> Self {
        match Backends::from_config(config) {
            Ok(backends) => Self::new(backends, history),
            Err(e) => {
                tracing::warn!("Chat pipeline disabled: {}", e);
                Self::unconfigured(history)
            }
        }
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub async fn handle(&self, raw_query: &str) -> Result<WeatherReply> {
        let mut stage = Stage::Received;
        tracing::info!(?stage, "[Main] Received chat query");

        let query = raw_query.trim();
        if query.is_empty() {
            return Err(WeatherChatError::Validation("empty query".to_string()));
        }

        let backends = self.backends.as_ref().ok_or_else(|| {
            WeatherChatError::Configuration("Missing API credentials".to_string())
        })?;

        stage = Stage::Parsing;
        tracing::info!(?stage, "[Main] Processing query: {}", query);
        let intent = backends.parser.parse(query).await?;

        stage = Stage::Fetching;
        tracing::info!(?stage, location = %intent.location, "[Main] Fetching weather");
        let weather = backends.provider.fetch(&intent).await?;

        stage = Stage::Enriching;
        tracing::info!(?stage, "[Main] Successfully fetched weather data");
        let (condition, temperature) = weather.headline();
        let limerick = backends
            .embellisher
            .embellish(weather.location(), &condition, &temperature)
            .await;

        stage = Stage::Persisting;
        tracing::debug!(?stage, has_limerick = limerick.is_some());
        self.history
            .append(HistoryEntry::new(
                query.to_string(),
                weather.location().to_string(),
                weather.kind(),
            ))
            .await;

        stage = Stage::Responded;
        tracing::info!(?stage, "[Main] Returning successful response");
        Ok(WeatherReply { weather, limerick })
    }
}

/// Status code and user-facing body for a failed request.
pub fn error_response(err: &WeatherChatError) -> (StatusCode, ErrorBody) {
    let (status, message) = match err {
        WeatherChatError::Validation(_) => (
            StatusCode::BAD_REQUEST,
            "Please enter a weather query (e.g., 'What's the weather in London?')".to_string(),
        ),
        WeatherChatError::Configuration(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server configuration error. Please contact the administrator.".to_string(),
        ),
        WeatherChatError::IntentParse { kind, .. } => match kind {
            IntentFailure::Upstream => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to understand your query. Please try rephrasing (e.g., 'weather in Paris')."
                    .to_string(),
            ),
            IntentFailure::Malformed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process your query. Please try asking in a simpler way (e.g., 'weather in London')."
                    .to_string(),
            ),
            IntentFailure::Unrecognized => (
                StatusCode::BAD_REQUEST,
                "Couldn't understand your query: AI couldn't identify a location in your query. Try: 'What's the weather in [city]?'"
                    .to_string(),
            ),
        },
        e if e.is_provider_error() => (StatusCode::BAD_REQUEST, e.to_string()),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("An unexpected error occurred: {other}. Please try again."),
        ),
    };

    if status.is_server_error() {
        tracing::error!("[Main] Request failed ({}): {}", status.as_u16(), err);
    } else {
        tracing::warn!("[Main] Request rejected ({}): {}", status.as_u16(), err);
    }

    (status, ErrorBody { error: message })
}
