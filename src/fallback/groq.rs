use std::env;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::fallback::conversation::{Turn, to_messages};
use crate::fallback::rate_limit::parse_retry_after;
use crate::fallback::service::{CompletionService, ServiceError};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

pub fn is_api_key_present() -> bool {
    env::var(API_KEY_ENV)
        .ok()
        .is_some_and(|value| !value.trim().is_empty())
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// Blocking client for Groq's OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct GroqClient {
    api_key: String,
    base_url: String,
    client: Client,
    max_completion_tokens: Option<u32>,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
            max_completion_tokens: None,
        }
    }

    /// Creates a client from the `GROQ_API_KEY` env var.
    pub fn from_env() -> Result<Self, ServiceError> {
        let api_key = env::var(API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ServiceError::MissingApiKey {
                key_env: API_KEY_ENV,
            })?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_completion_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_completion_tokens = max_tokens;
        self
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.base_url)
    }

    /// Synthesizes `input` with a TTS model and returns the WAV bytes.
    pub fn synthesize(
        &self,
        model: &str,
        voice: &str,
        input: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, ServiceError> {
        let payload = SpeechRequest {
            model,
            voice,
            input,
            response_format: "wav",
        };
        debug!(model, voice, chars = input.chars().count(), "requesting speech");

        let response = self
            .client
            .post(self.speech_url())
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&payload)
            .send()?;
        let response = check_status(response)?;
        Ok(response.bytes()?.to_vec())
    }
}

impl CompletionService for GroqClient {
    fn complete(
        &self,
        model: &str,
        conversation: &[Turn],
        timeout: Duration,
    ) -> Result<String, ServiceError> {
        let payload = ChatCompletionRequest {
            model,
            messages: to_messages(conversation),
            stream: false,
            max_completion_tokens: self.max_completion_tokens,
        };

        let response = self
            .client
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&payload)
            .send()?;
        let response = check_status(response)?;

        let body: ChatCompletionResponse = response.json()?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ServiceError::EmptyResponse)
    }
}

fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = parse_retry_after(response.headers());
        debug!(?retry_after, "service signalled rate limit");
        return Err(ServiceError::RateLimited { retry_after });
    }

    let body = response.text().unwrap_or_default();
    Err(ServiceError::Api { status, body })
}
