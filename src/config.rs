//! Settings read from the process environment, with command-line overrides
//! layered on top. Every loader takes a lookup function so tests never touch
//! the real environment.

use crate::http::{TlsTrust, DEFAULT_TIMEOUT};
use crate::oracle::DEFAULT_TEMPERATURE;
use crate::retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::slack::DEFAULT_API_BASE;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingCredential(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Values given on the command line. They win over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub insecure: bool,
    pub ca_bundle: Option<PathBuf>,
    pub system_roots: bool,
}

/// Transport settings shared by the oracle and the chat poster.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub tls: TlsTrust,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { tls: TlsTrust::default(), timeout: DEFAULT_TIMEOUT, retry: RetryPolicy::default() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackSettings {
    pub token: Option<String>,
    pub channel: Option<String>,
    pub api_base: String,
}

pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn non_empty<L>(lookup: &L, name: &str) -> Option<String>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_u64<L>(lookup: &L, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, name) {
        None => Ok(None),
        Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

fn parse_secs<L>(lookup: &L, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, name) {
        None => Ok(None),
        Some(raw) => match raw.parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            _ => Err(ConfigError::Invalid { name, value: raw }),
        },
    }
}

/// `1`, `true`, `yes` and `on` (any case) are true; anything else is false.
pub fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Model name only. Usable without a key, e.g. when posting existing summaries.
pub fn resolve_model<L>(lookup: &L, overrides: &Overrides) -> String
where
    L: Fn(&str) -> Option<String>,
{
    overrides
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| non_empty(lookup, "OPENAI_MODEL"))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

impl HttpSettings {
    pub fn from_lookup<L>(lookup: &L, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let insecure = overrides.insecure || non_empty(lookup, "OPENAI_INSECURE_SKIP_VERIFY").is_some_and(|v| parse_flag(&v));
        let ca_bundle = overrides.ca_bundle.clone().or_else(|| non_empty(lookup, "OPENAI_CA_BUNDLE").map(PathBuf::from));
        let prefer_platform = overrides.system_roots
            || match non_empty(lookup, "OPENAI_TLS_ROOTS") {
                None => false,
                Some(v) => match v.to_ascii_lowercase().as_str() {
                    "platform" | "system" | "native" => true,
                    "bundled" | "webpki" => false,
                    _ => return Err(ConfigError::Invalid { name: "OPENAI_TLS_ROOTS", value: v }),
                },
            };

        let attempts = match parse_u64(lookup, "OPENAI_RETRIES")? {
            Some(n) => u32::try_from(n).map_err(|_| ConfigError::Invalid { name: "OPENAI_RETRIES", value: n.to_string() })?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        let backoff = parse_secs(lookup, "OPENAI_RETRY_BACKOFF")?.unwrap_or(DEFAULT_BASE_DELAY);
        let timeout = parse_secs(lookup, "OPENAI_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT);

        Ok(Self {
            tls: TlsTrust::resolve(insecure, ca_bundle, prefer_platform),
            timeout,
            retry: RetryPolicy::new(attempts, backoff),
        })
    }

    pub fn from_env(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup, overrides)
    }
}

impl OracleSettings {
    pub fn from_lookup<L>(lookup: &L, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let api_key = non_empty(lookup, API_KEY_VAR).ok_or(ConfigError::MissingCredential(API_KEY_VAR))?;
        let base_url = non_empty(lookup, "OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: resolve_model(lookup, overrides),
            temperature: DEFAULT_TEMPERATURE,
            http: HttpSettings::from_lookup(lookup, overrides)?,
        })
    }

    pub fn from_env(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup, overrides)
    }
}

impl SlackSettings {
    pub fn from_lookup<L>(lookup: &L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        Self {
            token: non_empty(lookup, "SLACK_BOT_TOKEN").or_else(|| non_empty(lookup, "SLACK_TOKEN")),
            channel: non_empty(lookup, "SLACK_CHANNEL"),
            api_base: non_empty(lookup, "SLACK_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }

    /// Token and channel, when both are known.
    pub fn target(&self) -> Option<(&str, &str)> {
        Some((self.token.as_deref()?, self.channel.as_deref()?))
    }
}
