use async_trait::async_trait;
use std::sync::Arc;

use crate::models::ChatMessage;
use crate::transport::Transport;

#[cfg(test)]
use mockall::automock;

const POET_PROMPT: &str =
    "You are a creative poet who writes fun limericks. Output only the limerick poem, nothing else.";

/// Best-effort creative text for a resolved weather result. Never fails: `None` on any problem.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Embellisher: Send + Sync {
    async fn embellish(&self, location: &str, condition: &str, temperature: &str) -> Option<String>;
}

pub struct WorkersAiLimerick {
    tx: Arc<dyn Transport>,
    model: String,
}

impl WorkersAiLimerick {
    pub fn new(tx: Arc<dyn Transport>, model: String) -> Self {
        Self { tx, model }
    }
}

fn limerick_prompt(location: &str, condition: &str, temperature: &str) -> String {
    format!(
        "Write a fun, creative limerick (5-line poem with AABBA rhyme scheme) about {location} and its current weather.\n\n\
         Weather details:\n\
         - Location: {location}\n\
         - Condition: {condition}\n\
         - Temperature: {temperature}\n\n\
         Output ONLY the limerick, no other text."
    )
}

/// Trim whitespace, then any wrapping double and single quotes.
fn clean_reply(reply: &str) -> Option<String> {
    let cleaned = reply.trim().trim_matches('"').trim_matches('\'');
    (!cleaned.trim().is_empty()).then(|| cleaned.to_string())
}

#[async_trait]
impl Embellisher for WorkersAiLimerick {
    async fn embellish(
        &self,
        location: &str,
        condition: &str,
        temperature: &str,
    ) -> Option<String> {
        tracing::info!("[Limerick] Generating limerick for {}", location);

        let messages = [
            ChatMessage::system(POET_PROMPT),
            ChatMessage::user(limerick_prompt(location, condition, temperature)),
        ];

        match self.tx.run(&self.model, &messages).await {
            Ok(reply) => match clean_reply(&reply) {
                Some(limerick) => {
                    tracing::info!("[Limerick] Successfully generated limerick");
                    Some(limerick)
                }
                None => {
                    tracing::warn!("[Limerick] Warning: No limerick in response");
                    None
                }
            },
            Err(e) => {
                tracing::warn!("[Limerick] Non-critical error: {}", e);
                None
            }
        }
    }
}
