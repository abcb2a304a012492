use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error calling {url}: {message}")]
    Network { url: String, message: String },
    #[error("HTTP {status} error from {url}: {body}")]
    Status { status: u16, url: String, body: String },
    #[error("TLS configuration error: {0}")]
    Tls(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Where the HTTPS client takes its trust roots from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TlsTrust {
    /// Certificate verification disabled entirely.
    Insecure,
    /// PEM bundle used as the only set of trust roots.
    CaBundle(PathBuf),
    /// Compiled-in webpki roots.
    #[default]
    Bundled,
    /// Operating system trust store.
    Platform,
}

impl TlsTrust {
    /// First match wins: insecure, an existing CA bundle, then bundled or platform roots.
    pub fn resolve(insecure: bool, ca_bundle: Option<PathBuf>, prefer_platform: bool) -> Self {
        if insecure {
            return TlsTrust::Insecure;
        }
        if let Some(path) = ca_bundle {
            if path.exists() {
                return TlsTrust::CaBundle(path);
            }
            warn!(path = %path.display(), "CA bundle not found, falling back to default trust roots");
        }
        if prefer_platform { TlsTrust::Platform } else { TlsTrust::Bundled }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A bearer-authenticated JSON POST.
#[derive(Debug, Clone, Copy)]
pub struct JsonRequest<'a> {
    pub url: &'a str,
    pub bearer: &'a str,
    pub body: &'a Value,
}

/// Sends one request. `Err` means no HTTP response was received at all.
pub trait Transport {
    fn post_json(&self, request: &JsonRequest<'_>) -> Result<HttpResponse, String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post_json(&self, request: &JsonRequest<'_>) -> Result<HttpResponse, String> {
        (**self).post_json(request)
    }
}

/// Blocking reqwest transport with a per-attempt timeout.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(trust: &TlsTrust, timeout: Duration) -> Result<Self, TransportError> {
        let builder = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("issuescope/", env!("CARGO_PKG_VERSION")));
        let builder = match trust {
            TlsTrust::Insecure => builder.use_rustls_tls().danger_accept_invalid_certs(true),
            TlsTrust::CaBundle(path) => {
                let pem = std::fs::read(path)
                    .map_err(|e| TransportError::Tls(format!("cannot read {}: {e}", path.display())))?;
                let certs = reqwest::Certificate::from_pem_bundle(&pem)
                    .map_err(|e| TransportError::Tls(format!("invalid PEM bundle {}: {e}", path.display())))?;
                if certs.is_empty() {
                    return Err(TransportError::Tls(format!("no certificates in {}", path.display())));
                }
                certs
                    .into_iter()
                    .fold(builder.use_rustls_tls().tls_built_in_root_certs(false), |b, c| b.add_root_certificate(c))
            }
            TlsTrust::Bundled => builder
                .use_rustls_tls()
                .tls_built_in_root_certs(false)
                .tls_built_in_webpki_certs(true),
            TlsTrust::Platform => builder
                .use_rustls_tls()
                .tls_built_in_root_certs(false)
                .tls_built_in_native_certs(true),
        };
        let client = builder.build().map_err(|e| TransportError::Client(e.to_string()))?;
        debug!(?trust, timeout_secs = timeout.as_secs(), "http client ready");
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn post_json(&self, request: &JsonRequest<'_>) -> Result<HttpResponse, String> {
        let resp = self
            .client
            .post(request.url)
            .bearer_auth(request.bearer)
            .json(request.body)
            .send()
            .map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(|e| e.to_string())?;
        Ok(HttpResponse { status, body })
    }
}

/// Applies a [`RetryPolicy`] around a [`Transport`].
pub struct JsonPoster<T, S = ThreadSleeper> {
    transport: T,
    policy: RetryPolicy,
    sleeper: S,
}

impl<T: Transport> JsonPoster<T, ThreadSleeper> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy, sleeper: ThreadSleeper }
    }
}

impl<T: Transport, S: Sleeper> JsonPoster<T, S> {
    pub fn with_sleeper(transport: T, policy: RetryPolicy, sleeper: S) -> Self {
        Self { transport, policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the first successful response. Network failures and retryable
    /// statuses are retried until the attempt budget runs out.
    pub fn post(&self, url: &str, bearer: &str, body: &Value) -> Result<HttpResponse, TransportError> {
        let request = JsonRequest { url, bearer, body };
        let mut attempt = 1;
        loop {
            let retry = match self.transport.post_json(&request) {
                Ok(resp) if resp.is_success() => return Ok(resp),
                Ok(resp) => {
                    if !self.policy.is_retryable_status(resp.status) || !self.policy.has_attempts_after(attempt) {
                        return Err(TransportError::Status { status: resp.status, url: url.to_string(), body: resp.body });
                    }
                    format!("HTTP {}", resp.status)
                }
                Err(message) => {
                    if !self.policy.has_attempts_after(attempt) {
                        return Err(TransportError::Network { url: url.to_string(), message });
                    }
                    message
                }
            };
            let delay = self.policy.delay_for(attempt);
            warn!(attempt, max_attempts = self.policy.attempts(), delay_ms = delay.as_millis() as u64, reason = %retry, "retrying request");
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }
}
