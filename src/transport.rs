use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{Config, RetryConfig};
use crate::error::{Result, WeatherChatError};
use crate::models::{ChatMessage, WorkersAiRequest, WorkersAiResponse};

#[cfg(test)]
use mockall::automock;

/// Text-completion endpoint used by the intent parser and the limerick writer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `model` over `messages` and return the completion text.
    async fn run(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;
}

pub struct WorkersAiTransport {
    client: Client,
    base_url: String,
    account_id: String,
    api_token: String,
    retry: RetryConfig,
}

impl WorkersAiTransport {
    pub fn new(
        client: Client,
        base_url: String,
        account_id: String,
        api_token: String,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id,
            api_token,
            retry,
        }
    }

    pub fn from_config(
        client: Client,
        cfg: &Config,
        account_id: String,
        api_token: String,
    ) -> Self {
        Self::new(
            client,
            cfg.workers_ai.base_url.clone(),
            account_id,
            api_token,
            cfg.retry.clone(),
        )
    }

    fn run_url(&self, model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url, self.account_id, model
        )
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base_delay = Duration::from_millis(
            self.retry
                .initial_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1))),
        );
        let jitter = rand::thread_rng().gen_range(0.8..=1.2);
        let delay = Duration::from_millis((base_delay.as_millis() as f64 * jitter) as u64);
        std::cmp::min(delay, Duration::from_millis(self.retry.max_delay_ms))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn unwrap_envelope(envelope: WorkersAiResponse) -> Result<String> {
    if envelope.success {
        if let Some(text) = envelope.result.and_then(|r| r.response) {
            return Ok(text);
        }
        return Err(WeatherChatError::Internal(
            "Workers AI returned no result".to_string(),
        ));
    }

    let reason = envelope
        .errors
        .first()
        .map(|e| match e.code {
            Some(code) => format!("{} (code {code})", e.message),
            None => e.message.clone(),
        })
        .unwrap_or_else(|| "Unknown AI error".to_string());
    Err(WeatherChatError::Internal(format!(
        "Workers AI failed: {reason}"
    )))
}

#[async_trait]
impl Transport for WorkersAiTransport {
    async fn run(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = self.run_url(model);
        let body = WorkersAiRequest {
            messages: messages.to_vec(),
        };
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let outcome = self
                .client
                .post(&url)
                .bearer_auth(&self.api_token)
                .json(&body)
                .send()
                .await;

            let retry_reason = match outcome {
                Ok(response) => {
                    let status = response.status();
                    tracing::info!("[Workers AI] Response status: {}", status.as_u16());

                    if status.is_success() {
                        let envelope: WorkersAiResponse = response.json().await.map_err(|e| {
                            WeatherChatError::Internal(format!(
                                "Failed to parse Workers AI response: {e}"
                            ))
                        })?;
                        return unwrap_envelope(envelope);
                    }

                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    tracing::warn!("[Workers AI] Error response: {}", truncate(&text, 200));

                    if !is_retryable(status) {
                        return Err(WeatherChatError::Internal(format!(
                            "Workers AI API error (HTTP {}): {}",
                            status.as_u16(),
                            truncate(&text, 100)
                        )));
                    }
                    format!("HTTP {}: {}", status.as_u16(), truncate(&text, 100))
                }
                Err(e) => {
                    tracing::warn!("[Workers AI] Request failed: {}", e);
                    e.to_string()
                }
            };

            if attempts >= max_attempts {
                return Err(WeatherChatError::Internal(format!(
                    "Workers AI request failed after {attempts} attempts: {retry_reason}"
                )));
            }

            let delay = self.backoff(attempts);
            tracing::debug!("[Workers AI] Retrying in {:?} (attempt {})", delay, attempts + 1);
            sleep(delay).await;
        }
    }
}

pub(crate) fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
