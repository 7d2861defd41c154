//! Text correction
//!
//! A corrector takes raw page text and returns a corrected version. It never
//! fails: any problem yields the input text unchanged.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::CorrectorConfig;
use crate::error::CorrectionError;

const SYSTEM_PROMPT: &str = "You correct spelling, OCR artifacts and broken whitespace in text \
extracted from web pages. Keep the original language, wording and line structure. \
Return only the corrected text.";

/// Text corrector trait
#[async_trait]
pub trait TextCorrector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Return corrected text, or `text` unchanged on any failure
    async fn correct(&self, text: &str) -> String;
}

/// Corrector that returns its input
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCorrector;

#[async_trait]
impl TextCorrector for PassthroughCorrector {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn correct(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Corrector backed by a chat-completions API
pub struct ChatCompletionCorrector {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatCompletionCorrector {
    pub fn new(config: &CorrectorConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout,
        }
    }

    async fn request(&self, text: &str) -> Result<String, CorrectionError> {
        let request = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text }
            ]
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CorrectionError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(CorrectionError::Empty)
    }
}

#[async_trait]
impl TextCorrector for ChatCompletionCorrector {
    fn name(&self) -> &'static str {
        "chat-completion"
    }

    async fn correct(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        match self.request(text).await {
            Ok(corrected) => {
                tracing::debug!(
                    model = %self.model,
                    original_chars = text.chars().count(),
                    corrected_chars = corrected.chars().count(),
                    "Text corrected"
                );
                corrected
            }
            Err(e) => {
                tracing::warn!(
                    model = %self.model,
                    error = %e,
                    "Text correction failed, keeping original text"
                );
                text.to_string()
            }
        }
    }
}
