use crate::http::{JsonPoster, ReqwestTransport, Transport, TransportError};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected response format from oracle: {detail}")]
    Parse { detail: String },
}

impl OracleError {
    pub fn is_parse(&self) -> bool {
        matches!(self, OracleError::Parse { .. })
    }
}

/// A black-box text generator: one system prompt, one user message, one completion.
pub trait Oracle {
    fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, OracleError>;
}

impl<T: Oracle + ?Sized> Oracle for &T {
    fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, OracleError> {
        (**self).complete(system_prompt, user_content)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

/// Chat-completion endpoint client (`{base_url}/chat/completions`).
pub struct ChatCompletionClient<T, S = ThreadSleeper> {
    poster: JsonPoster<T, S>,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionClient<ReqwestTransport, ThreadSleeper> {
    pub fn from_settings(settings: &crate::config::OracleSettings) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(&settings.http.tls, settings.http.timeout)?;
        Ok(Self::new(
            JsonPoster::new(transport, settings.http.retry.clone()),
            &settings.base_url,
            &settings.api_key,
            &settings.model,
        )
        .with_temperature(settings.temperature))
    }
}

impl<T: Transport, S: Sleeper> ChatCompletionClient<T, S> {
    pub fn new(poster: JsonPoster<T, S>, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            poster,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.poster.policy()
    }

    fn request_body(&self, system_prompt: &str, user_content: &str) -> Result<Value, OracleError> {
        let req = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_content },
            ],
            temperature: self.temperature,
        };
        serde_json::to_value(&req).map_err(|e| OracleError::Parse { detail: format!("cannot encode request: {e}") })
    }
}

impl<T: Transport, S: Sleeper> Oracle for ChatCompletionClient<T, S> {
    fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, OracleError> {
        let body = self.request_body(system_prompt, user_content)?;
        debug!(endpoint = %self.endpoint, model = %self.model, chars = user_content.chars().count(), "calling oracle");
        let resp = self.poster.post(&self.endpoint, &self.api_key, &body)?;
        completion_text(&resp.body)
    }
}

/// Reads `choices[0].message.content` from a chat-completion response body.
pub fn completion_text(body: &str) -> Result<String, OracleError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| OracleError::Parse { detail: format!("{e}; body={}", truncate(body, 500)) })?;
    v.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| OracleError::Parse { detail: format!("missing choices[0].message.content; body={}", truncate(body, 500)) })
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
