use crate::blocks::BlockDocument;
use crate::config::HttpSettings;
use crate::http::{JsonPoster, ReqwestTransport, Transport, TransportError};
use crate::retry::{Sleeper, ThreadSleeper};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected chat API response: {0}")]
    Decode(String),
}

/// Reply of `chat.postMessage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostReceipt {
    pub ok: bool,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct SlackClient<T, S = ThreadSleeper> {
    poster: JsonPoster<T, S>,
    api_base: String,
    token: String,
}

impl SlackClient<ReqwestTransport, ThreadSleeper> {
    pub fn from_settings(token: &str, api_base: &str, http: &HttpSettings) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(&http.tls, http.timeout)?;
        Ok(Self::new(JsonPoster::new(transport, http.retry.clone()), api_base, token))
    }
}

impl<T: Transport, S: Sleeper> SlackClient<T, S> {
    pub fn new(poster: JsonPoster<T, S>, api_base: &str, token: &str) -> Self {
        Self { poster, api_base: api_base.trim_end_matches('/').to_string(), token: token.to_string() }
    }

    /// Posts a block document to `channel`. A reply with `ok: false` is
    /// logged and returned, not treated as an error.
    pub fn post_message(&self, channel: &str, document: &BlockDocument) -> Result<PostReceipt, SlackError> {
        let mut body = serde_json::to_value(document).map_err(|e| SlackError::Decode(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("channel".to_string(), Value::String(channel.to_string()));
        }
        let url = format!("{}/chat.postMessage", self.api_base);
        let resp = self.poster.post(&url, &self.token, &body)?;
        let receipt: PostReceipt = serde_json::from_str(&resp.body).map_err(|e| SlackError::Decode(format!("{e}; body={}", resp.body)))?;
        if receipt.ok {
            info!(channel, ts = receipt.ts.as_deref().unwrap_or(""), "posted summary");
        } else {
            warn!(channel, error = receipt.error.as_deref().unwrap_or("unknown"), "chat API rejected message");
        }
        Ok(receipt)
    }
}
