use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::action::Action;
use crate::catalog::ActionCatalog;
use crate::config::Config;
use crate::cursor::UpdateCursor;
use crate::error::{GatewayError, TransportError};
use crate::telegram::{BotTransport, TelegramApi};

/// Owns the transport handle, the cached bot identity, the update cursor,
/// and the action catalog. The session is created lazily on the first
/// dispatched action and released exactly once via [`Gateway::shutdown`].
pub struct Gateway {
    config: Config,
    catalog: ActionCatalog,
    transport: Mutex<Option<Arc<dyn BotTransport>>>,
    identity: Mutex<Option<Value>>,
    cursor: Mutex<UpdateCursor>,
}

impl Gateway {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            catalog: ActionCatalog::new(),
            transport: Mutex::new(None),
            identity: Mutex::new(None),
            cursor: Mutex::new(UpdateCursor::default()),
        }
    }

    /// Constructor with a pre-established transport, used by embedders and
    /// tests that bring their own session.
    pub fn with_transport(config: Config, transport: Arc<dyn BotTransport>) -> Self {
        Self {
            config,
            catalog: ActionCatalog::new(),
            transport: Mutex::new(Some(transport)),
            identity: Mutex::new(None),
            cursor: Mutex::new(UpdateCursor::default()),
        }
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// Single entry point for the tool-call boundary. Validation and
    /// transport failures come back as `Ok` envelopes with `success: false`;
    /// only a failed session bootstrap escapes as an error.
    pub async fn dispatch(&self, name: &str, args: &Value) -> Result<Value, GatewayError> {
        let action = match Action::parse(name, args, self.config.default_chat_id()) {
            Ok(action) => action,
            Err(err) => {
                debug!("rejected {name} call: {err}");
                return Ok(failure_envelope(&err.to_string()));
            }
        };
        let transport = self.ensure_transport().await?;
        match self.execute(transport, action).await {
            Ok(payload) => Ok(success_envelope(payload)),
            Err(err) => {
                warn!("{name} failed: {err}");
                Ok(failure_envelope(&err.to_string()))
            }
        }
    }

    async fn ensure_transport(&self) -> Result<Arc<dyn BotTransport>, GatewayError> {
        let mut guard = self.transport.lock().await;
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }
        let (api, identity) = TelegramApi::connect(&self.config).await?;
        let transport: Arc<dyn BotTransport> = api;
        *guard = Some(transport.clone());
        *self.identity.lock().await = Some(shape_identity(&identity));
        Ok(transport)
    }

    async fn execute(
        &self,
        transport: Arc<dyn BotTransport>,
        action: Action,
    ) -> Result<Value, TransportError> {
        match action {
            Action::SendMessage(args) => {
                let message = transport
                    .send_message(
                        &args.chat.0,
                        &args.text,
                        args.mode.as_wire(),
                        args.disable_notification,
                    )
                    .await?;
                Ok(json!({
                    "message_id": message.get("message_id").cloned().unwrap_or(Value::Null),
                    "chat_id": message.pointer("/chat/id").cloned().unwrap_or(Value::Null),
                    "date": message.get("date").cloned().unwrap_or(Value::Null),
                }))
            }
            Action::SendPhoto(args) => {
                let has_caption = args.caption.is_some();
                let message = transport
                    .send_photo(
                        &args.chat.0,
                        &args.photo_url,
                        args.caption.as_deref(),
                        args.mode.as_wire(),
                    )
                    .await?;
                Ok(json!({
                    "message_id": message.get("message_id").cloned().unwrap_or(Value::Null),
                    "chat_id": message.pointer("/chat/id").cloned().unwrap_or(Value::Null),
                    "has_caption": has_caption,
                }))
            }
            Action::SendDocument(args) => {
                let has_caption = args.caption.is_some();
                let message = transport
                    .send_document(&args.chat.0, &args.document_url, args.caption.as_deref())
                    .await?;
                Ok(json!({
                    "message_id": message.get("message_id").cloned().unwrap_or(Value::Null),
                    "chat_id": message.pointer("/chat/id").cloned().unwrap_or(Value::Null),
                    "has_caption": has_caption,
                }))
            }
            Action::GetUpdates(args) => {
                // the lock spans pull + advance so concurrent fetches cannot
                // race the offset and lose or replay updates
                let mut cursor = self.cursor.lock().await;
                let offset = cursor.next_offset();
                let batch = transport
                    .get_updates(offset, args.limit, args.timeout, None)
                    .await?;
                cursor.advance(&batch);
                let updates: Vec<Value> = batch.iter().map(flatten_update).collect();
                Ok(json!({
                    "updates": updates,
                    "count": updates.len(),
                }))
            }
            Action::GetBotInfo => {
                let me = transport.get_me().await?;
                Ok(shape_bot_info(&me))
            }
            Action::GetChatInfo(args) => {
                let chat = transport.get_chat(&args.chat.0).await?;
                let mut payload = shape_chat_info(&chat);
                // best-effort enrichment; a missing member count never fails
                // the primary lookup
                match transport.get_chat_member_count(&args.chat.0).await {
                    Ok(count) => {
                        payload["member_count"] = json!(count);
                    }
                    Err(err) => debug!("member count lookup skipped: {err}"),
                }
                Ok(payload)
            }
            Action::SetWebhook(args) => {
                let acknowledged = transport
                    .set_webhook(
                        &args.url,
                        args.ip_address.as_deref(),
                        args.max_connections,
                        args.allowed_updates.as_deref(),
                    )
                    .await?;
                Ok(json!({
                    "acknowledged": acknowledged,
                    "webhook_url": args.url,
                    "message": if acknowledged {
                        "Webhook set successfully"
                    } else {
                        "Failed to set webhook"
                    },
                }))
            }
            Action::DeleteWebhook => {
                let acknowledged = transport.delete_webhook().await?;
                Ok(json!({
                    "acknowledged": acknowledged,
                    "message": if acknowledged {
                        "Webhook deleted successfully"
                    } else {
                        "Failed to delete webhook"
                    },
                }))
            }
            Action::GetWebhookInfo => {
                let info = transport.get_webhook_info().await?;
                Ok(shape_webhook_info(&info))
            }
        }
    }

    /// Configuration snapshot for the inspectable-state boundary. Never
    /// exposes the credential itself, only whether one is present.
    pub fn config_status(&self) -> Value {
        json!({
            "bot_token_configured": self
                .config
                .telegram
                .bot_token
                .as_deref()
                .is_some_and(|token| !token.trim().is_empty()),
            "default_chat_id_configured": self.config.default_chat_id().is_some(),
            "environment": self.config.runtime.environment,
        })
    }

    /// Identity of the connected bot, available only once a session is
    /// live. The snapshot captured at session creation is served from the
    /// cache; the transport is only asked when the cache is cold. Lookup
    /// failures are silent; the document is simply omitted.
    pub async fn bot_identity(&self) -> Option<Value> {
        if let Some(cached) = self.identity.lock().await.clone() {
            return Some(cached);
        }
        let transport = self.transport.lock().await.as_ref().cloned()?;
        match transport.get_me().await {
            Ok(me) => {
                let shaped = shape_identity(&me);
                *self.identity.lock().await = Some(shaped.clone());
                Some(shaped)
            }
            Err(err) => {
                debug!("bot identity lookup skipped: {err}");
                None
            }
        }
    }

    /// Releases the transport and the identity snapshot that belongs to it.
    /// Safe to call repeatedly; only the first call closes the session.
    pub async fn shutdown(&self) {
        let taken = self.transport.lock().await.take();
        self.identity.lock().await.take();
        if let Some(transport) = taken {
            transport.close().await;
            info!("gateway session closed");
        }
    }
}

fn shape_identity(me: &Value) -> Value {
    json!({
        "id": me.get("id").cloned().unwrap_or(Value::Null),
        "username": me.get("username").cloned().unwrap_or(Value::Null),
        "first_name": me.get("first_name").cloned().unwrap_or(Value::Null),
        "is_bot": me.get("is_bot").cloned().unwrap_or(Value::Null),
    })
}

fn success_envelope(payload: Value) -> Value {
    let mut map = Map::new();
    map.insert("success".to_owned(), Value::Bool(true));
    if let Value::Object(fields) = payload {
        for (key, value) in fields {
            map.insert(key, value);
        }
    }
    Value::Object(map)
}

fn failure_envelope(message: &str) -> Value {
    json!({
        "success": false,
        "error": message,
    })
}

/// Trims an update to the fields a tool-calling agent actually consumes.
fn flatten_update(update: &Value) -> Value {
    let mut out = json!({
        "update_id": update.get("update_id").cloned().unwrap_or(Value::Null),
        "type": update_kind(update),
    });
    if let Some(message) = update.get("message") {
        out["message"] = json!({
            "id": message.get("message_id").cloned().unwrap_or(Value::Null),
            "date": message.get("date").cloned().unwrap_or(Value::Null),
            "text": message.get("text").cloned().unwrap_or(Value::Null),
            "from": {
                "id": message.pointer("/from/id").cloned().unwrap_or(Value::Null),
                "username": message.pointer("/from/username").cloned().unwrap_or(Value::Null),
                "first_name": message.pointer("/from/first_name").cloned().unwrap_or(Value::Null),
            },
            "chat": {
                "id": message.pointer("/chat/id").cloned().unwrap_or(Value::Null),
                "type": message.pointer("/chat/type").cloned().unwrap_or(Value::Null),
                "title": message.pointer("/chat/title").cloned().unwrap_or(Value::Null),
            },
        });
    }
    out
}

fn update_kind(update: &Value) -> &'static str {
    const KINDS: [&str; 6] = [
        "message",
        "edited_message",
        "channel_post",
        "edited_channel_post",
        "callback_query",
        "inline_query",
    ];
    for kind in KINDS {
        if update.get(kind).is_some() {
            return kind;
        }
    }
    "unknown"
}

fn shape_bot_info(me: &Value) -> Value {
    json!({
        "id": me.get("id").cloned().unwrap_or(Value::Null),
        "is_bot": me.get("is_bot").cloned().unwrap_or(Value::Null),
        "first_name": me.get("first_name").cloned().unwrap_or(Value::Null),
        "username": me.get("username").cloned().unwrap_or(Value::Null),
        "can_join_groups": me.get("can_join_groups").cloned().unwrap_or(Value::Null),
        "can_read_all_group_messages": me
            .get("can_read_all_group_messages")
            .cloned()
            .unwrap_or(Value::Null),
        "supports_inline_queries": me
            .get("supports_inline_queries")
            .cloned()
            .unwrap_or(Value::Null),
    })
}

fn shape_chat_info(chat: &Value) -> Value {
    json!({
        "id": chat.get("id").cloned().unwrap_or(Value::Null),
        "type": chat.get("type").cloned().unwrap_or(Value::Null),
        "title": chat.get("title").cloned().unwrap_or(Value::Null),
        "username": chat.get("username").cloned().unwrap_or(Value::Null),
        "first_name": chat.get("first_name").cloned().unwrap_or(Value::Null),
        "last_name": chat.get("last_name").cloned().unwrap_or(Value::Null),
        "description": chat.get("description").cloned().unwrap_or(Value::Null),
    })
}

fn shape_webhook_info(info: &Value) -> Value {
    json!({
        "url": info.get("url").cloned().unwrap_or(Value::Null),
        "has_custom_certificate": info
            .get("has_custom_certificate")
            .cloned()
            .unwrap_or(Value::Null),
        "pending_update_count": info
            .get("pending_update_count")
            .cloned()
            .unwrap_or(Value::Null),
        "ip_address": info.get("ip_address").cloned().unwrap_or(Value::Null),
        "last_error_date": info.get("last_error_date").cloned().unwrap_or(Value::Null),
        "last_error_message": info
            .get("last_error_message")
            .cloned()
            .unwrap_or(Value::Null),
        "max_connections": info.get("max_connections").cloned().unwrap_or(Value::Null),
        "allowed_updates": info.get("allowed_updates").cloned().unwrap_or(Value::Null),
    })
}
