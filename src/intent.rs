use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{IntentFailure, Result, WeatherChatError};
use crate::models::{ChatMessage, Intent, Timeframe, Units};
use crate::transport::Transport;

#[cfg(test)]
use mockall::automock;

const INTENT_PROMPT: &str = r#"You are a weather query parser. Convert natural language weather queries into JSON.
Output format: {"intent": "get_weather", "q": "location", "units": "metric"|"imperial", "timeframe": "now"|"today"|"tomorrow"|"7d"}

Rules:
- Default to "metric" unless Fahrenheit/imperial is mentioned
- Default to "now" unless a specific timeframe is mentioned
- Extract the location name for "q"
- Output ONLY valid JSON, no other text

Examples:
Input: "What's the weather in Paris?"
Output: {"intent": "get_weather", "q": "Paris", "units": "metric", "timeframe": "now"}"#;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait IntentParser: Send + Sync {
    async fn parse(&self, query: &str) -> Result<Intent>;
}

pub struct WorkersAiIntent {
    tx: Arc<dyn Transport>,
    model: String,
}

impl WorkersAiIntent {
    pub fn new(tx: Arc<dyn Transport>, model: String) -> Self {
        Self { tx, model }
    }
}

/// Shape of the object the model is asked to emit. Missing or null `units`/`timeframe`
/// take the same defaults the prompt tells the model to use.
#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: Option<String>,
    #[serde(rename = "q", alias = "location")]
    location: Option<String>,
    units: Option<Units>,
    timeframe: Option<Timeframe>,
}

impl RawIntent {
    fn validate(self) -> Result<Intent> {
        if self.intent.as_deref() != Some("get_weather") {
            return Err(WeatherChatError::intent(
                IntentFailure::Unrecognized,
                format!("unsupported intent {:?}", self.intent),
            ));
        }

        let location = self
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                WeatherChatError::intent(
                    IntentFailure::Unrecognized,
                    "AI couldn't identify a location in your query",
                )
            })?;

        Ok(Intent {
            location,
            units: self.units.unwrap_or_default(),
            timeframe: self.timeframe.unwrap_or_default(),
        })
    }
}

/// Substring from the first `{` to the last `}`, inclusive.
pub fn extract_json_span(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Turn a raw model reply into a validated intent.
pub fn intent_from_reply(reply: &str) -> Result<Intent> {
    let span = extract_json_span(reply).ok_or_else(|| {
        WeatherChatError::intent(
            IntentFailure::Malformed,
            "AI response doesn't contain valid JSON",
        )
    })?;

    let raw: RawIntent = serde_json::from_str(span).map_err(|e| {
        WeatherChatError::intent(
            IntentFailure::Malformed,
            format!("Failed to deserialize intent JSON: {e}. Raw: {span}"),
        )
    })?;

    raw.validate()
}

#[async_trait]
impl IntentParser for WorkersAiIntent {
    async fn parse(&self, query: &str) -> Result<Intent> {
        tracing::info!("[Workers AI] Parsing query: {}", query);

        let messages = [ChatMessage::system(INTENT_PROMPT), ChatMessage::user(query)];

        let reply = self.tx.run(&self.model, &messages).await.map_err(|e| {
            WeatherChatError::intent(
                IntentFailure::Upstream,
                format!("AI query parsing failed: {e}"),
            )
        })?;

        if reply.trim().is_empty() {
            return Err(WeatherChatError::intent(
                IntentFailure::Upstream,
                "AI returned empty response",
            ));
        }

        let intent = intent_from_reply(&reply)?;
        tracing::info!(
            location = %intent.location,
            units = ?intent.units,
            timeframe = ?intent.timeframe,
            "Parsed query"
        );
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn parser_replying(reply: Result<String>) -> WorkersAiIntent {
        let mut tx = MockTransport::new();
        let mut reply = Some(reply);
        tx.expect_run()
            .withf(|model, messages| {
                model == "test-model"
                    && messages.len() == 2
                    && messages[0].role == "system"
                    && messages[1].role == "user"
            })
            .times(1)
            .returning(move |_, _| {
                reply
                    .take()
                    .unwrap_or_else(|| Err(WeatherChatError::Internal("called twice".into())))
            });
        WorkersAiIntent::new(Arc::new(tx), "test-model".to_string())
    }

    #[test]
    fn span_extraction() {
        assert_eq!(extract_json_span("noise {\"a\":1} tail"), Some("{\"a\":1}"));
        assert_eq!(extract_json_span("{\"a\":{\"b\":2}}"), Some("{\"a\":{\"b\":2}}"));
        assert_eq!(extract_json_span("no braces here"), None);
        assert_eq!(extract_json_span("} backwards {"), None);
    }

    #[test]
    fn reply_with_prose_around_json() {
        let intent = intent_from_reply(
            "Sure! Here it is: {\"intent\": \"get_weather\", \"q\": \"Paris\", \"units\": \"metric\", \"timeframe\": \"now\"} Hope that helps.",
        )
        .expect("valid intent");
        assert_eq!(intent.location, "Paris");
        assert_eq!(intent.units, Units::Metric);
        assert_eq!(intent.timeframe, Timeframe::Now);
    }

    #[test]
    fn present_values_are_trusted() {
        let intent = intent_from_reply(
            r#"{"intent":"get_weather","q":"Denver","units":"imperial","timeframe":"7d"}"#,
        )
        .unwrap();
        assert_eq!(intent.units, Units::Imperial);
        assert_eq!(intent.timeframe, Timeframe::Week);
    }

    #[test]
    fn absent_fields_take_defaults() {
        let intent = intent_from_reply(r#"{"intent":"get_weather","location":"Rome"}"#).unwrap();
        assert_eq!(intent.location, "Rome");
        assert_eq!(intent.units, Units::Metric);
        assert_eq!(intent.timeframe, Timeframe::Now);
    }

    #[test]
    fn null_fields_take_defaults() {
        let intent =
            intent_from_reply(r#"{"intent":"get_weather","q":"Oslo","units":null,"timeframe":null}"#)
                .unwrap();
        assert_eq!(intent.units, Units::Metric);
        assert_eq!(intent.timeframe, Timeframe::Now);
    }

    #[test]
    fn wrong_intent_is_unrecognized() {
        let err = intent_from_reply(r#"{"intent":"get_time","q":"Rome"}"#).unwrap_err();
        assert!(matches!(
            err,
            WeatherChatError::IntentParse {
                kind: IntentFailure::Unrecognized,
                ..
            }
        ));
    }

    #[test]
    fn blank_location_is_unrecognized() {
        let err = intent_from_reply(r#"{"intent":"get_weather","q":"  "}"#).unwrap_err();
        assert!(matches!(
            err,
            WeatherChatError::IntentParse {
                kind: IntentFailure::Unrecognized,
                ..
            }
        ));
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = intent_from_reply(r#"{"intent": "get_weather", "q": }"#).unwrap_err();
        assert!(matches!(
            err,
            WeatherChatError::IntentParse {
                kind: IntentFailure::Malformed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn parse_through_transport() {
        let parser = parser_replying(Ok(
            r#"{"intent": "get_weather", "q": "Paris", "units": "metric", "timeframe": "now"}"#
                .to_string(),
        ));
        let intent = parser.parse("weather in Paris").await.unwrap();
        assert_eq!(intent.location, "Paris");
    }

    #[tokio::test]
    async fn transport_failure_is_upstream() {
        let parser = parser_replying(Err(WeatherChatError::Internal("timeout".into())));
        let err = parser.parse("weather in Paris").await.unwrap_err();
        assert!(matches!(
            err,
            WeatherChatError::IntentParse {
                kind: IntentFailure::Upstream,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn reply_without_braces_is_malformed() {
        let parser = parser_replying(Ok("I am not sure what you mean.".to_string()));
        let err = parser.parse("blah").await.unwrap_err();
        assert!(matches!(
            err,
            WeatherChatError::IntentParse {
                kind: IntentFailure::Malformed,
                ..
            }
        ));
    }
}
