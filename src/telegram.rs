use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{GatewayError, TransportError};

/// Extra slack on top of the caller-supplied long-poll wait so the HTTP
/// request does not give up before the Bot API answers.
const POLL_TIMEOUT_SLACK_SECS: u64 = 10;

/// Primitive operations against the remote bot account. One logical handle;
/// the gateway owns its lifecycle. Every fallible operation returns a
/// `TransportError` instead of panicking, so the dispatcher can fold
/// failures into the result envelope.
#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
        disable_notification: bool,
    ) -> Result<Value, TransportError>;

    async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: Option<&str>,
        parse_mode: Option<&str>,
    ) -> Result<Value, TransportError>;

    async fn send_document(
        &self,
        chat_id: &str,
        document_url: &str,
        caption: Option<&str>,
    ) -> Result<Value, TransportError>;

    async fn get_updates(
        &self,
        offset: Option<i64>,
        limit: i64,
        timeout: i64,
        allowed_updates: Option<&[String]>,
    ) -> Result<Vec<Value>, TransportError>;

    async fn get_me(&self) -> Result<Value, TransportError>;

    async fn get_chat(&self, chat_id: &str) -> Result<Value, TransportError>;

    async fn get_chat_member_count(&self, chat_id: &str) -> Result<i64, TransportError>;

    async fn set_webhook(
        &self,
        url: &str,
        ip_address: Option<&str>,
        max_connections: Option<i64>,
        allowed_updates: Option<&[String]>,
    ) -> Result<bool, TransportError>;

    async fn delete_webhook(&self) -> Result<bool, TransportError>;

    async fn get_webhook_info(&self) -> Result<Value, TransportError>;

    async fn close(&self);
}

/// Bot API client over HTTPS. The network session lives as long as this
/// handle; the gateway creates it lazily and releases it on shutdown.
pub struct TelegramApi {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl TelegramApi {
    /// Builds the HTTP client and verifies the credential with `getMe`.
    /// A rejected credential surfaces as a session-initialization failure,
    /// distinct from per-call transport errors. The verified identity is
    /// returned alongside the handle so the caller can retain it.
    pub async fn connect(config: &Config) -> Result<(Arc<Self>, Value), GatewayError> {
        let token = config
            .telegram
            .bot_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::Config("telegram.bot_token is required".to_owned())
            })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.telegram.http_timeout_secs))
            .build()
            .map_err(|err| {
                GatewayError::SessionInit(format!("failed building http client: {err}"))
            })?;
        let api = Arc::new(Self {
            http,
            api_base: config.telegram.api_base.trim_end_matches('/').to_owned(),
            token,
        });
        let identity = api
            .get_me()
            .await
            .map_err(|err| GatewayError::SessionInit(format!("credential check failed: {err}")))?;
        let username = identity
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>");
        let bot_id = identity.get("id").and_then(Value::as_i64).unwrap_or(0);
        info!("telegram session established as @{username} (id={bot_id})");
        Ok((api, identity))
    }

    async fn call(&self, method: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        self.call_with_timeout(method, query, None).await
    }

    async fn call_with_timeout(
        &self,
        method: &str,
        query: &[(&str, String)],
        read_timeout: Option<Duration>,
    ) -> Result<Value, TransportError> {
        let base = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let mut request = self.http.get(base).query(query);
        if let Some(read_timeout) = read_timeout {
            request = request.timeout(read_timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|err| TransportError::new(format!("telegram {method} request failed: {err}")))?;
        let status = response.status();
        let body = response.text().await.map_err(|err| {
            TransportError::new(format!("telegram {method} body read failed: {err}"))
        })?;
        let payload: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) if status.is_success() => {
                return Err(TransportError::new(format!(
                    "telegram {method} invalid JSON: {err}"
                )))
            }
            Err(_) => {
                return Err(TransportError::new(format!(
                    "telegram {method} returned status {}: {}",
                    status.as_u16(),
                    truncate_text(&body, 256)
                )))
            }
        };
        if !payload.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let reason = payload
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("telegram API returned ok=false");
            return Err(TransportError::new(format!(
                "telegram {method} failed: {reason}"
            )));
        }
        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl BotTransport for TelegramApi {
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
        disable_notification: bool,
    ) -> Result<Value, TransportError> {
        let mut query = vec![
            ("chat_id", chat_id.to_owned()),
            ("text", text.to_owned()),
        ];
        if let Some(mode) = parse_mode {
            query.push(("parse_mode", mode.to_owned()));
        }
        if disable_notification {
            query.push(("disable_notification", "true".to_owned()));
        }
        self.call("sendMessage", &query).await
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: Option<&str>,
        parse_mode: Option<&str>,
    ) -> Result<Value, TransportError> {
        let mut query = vec![
            ("chat_id", chat_id.to_owned()),
            ("photo", photo_url.to_owned()),
        ];
        if let Some(caption) = caption {
            query.push(("caption", caption.to_owned()));
            if let Some(mode) = parse_mode {
                query.push(("parse_mode", mode.to_owned()));
            }
        }
        self.call("sendPhoto", &query).await
    }

    async fn send_document(
        &self,
        chat_id: &str,
        document_url: &str,
        caption: Option<&str>,
    ) -> Result<Value, TransportError> {
        let mut query = vec![
            ("chat_id", chat_id.to_owned()),
            ("document", document_url.to_owned()),
        ];
        if let Some(caption) = caption {
            query.push(("caption", caption.to_owned()));
        }
        self.call("sendDocument", &query).await
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        limit: i64,
        timeout: i64,
        allowed_updates: Option<&[String]>,
    ) -> Result<Vec<Value>, TransportError> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("timeout", timeout.to_string()),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        if let Some(kinds) = allowed_updates {
            let encoded = serde_json::to_string(kinds)
                .map_err(|err| TransportError::new(format!("allowed_updates encoding: {err}")))?;
            query.push(("allowed_updates", encoded));
        }
        // widen the request timeout so a long poll can run its course
        let read_timeout =
            Duration::from_secs(timeout.max(0) as u64 + POLL_TIMEOUT_SLACK_SECS);
        let result = self
            .call_with_timeout("getUpdates", &query, Some(read_timeout))
            .await?;
        result
            .as_array()
            .cloned()
            .ok_or_else(|| TransportError::new("telegram getUpdates result must be an array"))
    }

    async fn get_me(&self) -> Result<Value, TransportError> {
        self.call("getMe", &[]).await
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Value, TransportError> {
        self.call("getChat", &[("chat_id", chat_id.to_owned())])
            .await
    }

    async fn get_chat_member_count(&self, chat_id: &str) -> Result<i64, TransportError> {
        let result = self
            .call("getChatMemberCount", &[("chat_id", chat_id.to_owned())])
            .await?;
        result.as_i64().ok_or_else(|| {
            TransportError::new("telegram getChatMemberCount result must be an integer")
        })
    }

    async fn set_webhook(
        &self,
        url: &str,
        ip_address: Option<&str>,
        max_connections: Option<i64>,
        allowed_updates: Option<&[String]>,
    ) -> Result<bool, TransportError> {
        let mut query = vec![("url", url.to_owned())];
        if let Some(ip) = ip_address {
            query.push(("ip_address", ip.to_owned()));
        }
        if let Some(n) = max_connections {
            query.push(("max_connections", n.to_string()));
        }
        if let Some(kinds) = allowed_updates {
            let encoded = serde_json::to_string(kinds)
                .map_err(|err| TransportError::new(format!("allowed_updates encoding: {err}")))?;
            query.push(("allowed_updates", encoded));
        }
        let result = self.call("setWebhook", &query).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn delete_webhook(&self) -> Result<bool, TransportError> {
        let result = self.call("deleteWebhook", &[]).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    async fn get_webhook_info(&self) -> Result<Value, TransportError> {
        self.call("getWebhookInfo", &[]).await
    }

    async fn close(&self) {
        // reqwest pools connections internally; dropping the handle is the
        // actual release, this just marks the lifecycle edge in the logs
        debug!("telegram session released");
    }
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}
