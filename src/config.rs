use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API bearer credential. Required before the gateway will serve.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Fallback destination for send actions that omit `chat_id`.
    #[serde(default)]
    pub default_chat_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            default_chat_id: None,
            api_base: default_api_base(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_owned()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_environment() -> String {
    "production".to_owned()
}

impl Config {
    /// Reads the TOML file when present (defaults otherwise), then layers
    /// environment overrides on top.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed reading config file {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("failed parsing config file {}", path.display()))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("TELEGRAM_BOT_TOKEN") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                self.telegram.bot_token = Some(trimmed.to_owned());
            }
        }
        if let Ok(v) = env::var("TELEGRAM_CHAT_ID") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                self.telegram.default_chat_id = Some(trimmed.to_owned());
            }
        }
        if let Ok(v) = env::var("TELEGATE_API_BASE") {
            let trimmed = v.trim().trim_end_matches('/');
            if !trimmed.is_empty() {
                self.telegram.api_base = trimmed.to_owned();
            }
        }
        if let Ok(v) = env::var("TELEGATE_HTTP_TIMEOUT_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                self.telegram.http_timeout_secs = n.max(1);
            }
        }
        if let Ok(v) = env::var("ENVIRONMENT") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                self.runtime.environment = trimmed.to_owned();
            }
        }
    }

    /// Startup gate: the process refuses to serve without a credential.
    pub fn validate(&self) -> Result<(), GatewayError> {
        match self.telegram.bot_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(()),
            _ => Err(GatewayError::Config(
                "telegram.bot_token is required (set TELEGRAM_BOT_TOKEN)".to_owned(),
            )),
        }
    }

    pub fn default_chat_id(&self) -> Option<&str> {
        self.telegram
            .default_chat_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}
