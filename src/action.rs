use serde_json::Value;
use url::Url;

use crate::catalog::{
    DEFAULT_POLL_TIMEOUT_SECS, DEFAULT_UPDATE_LIMIT, UPDATE_LIMIT_MAX, UPDATE_LIMIT_MIN,
};
use crate::error::ValidationError;

/// Formatting applied to outgoing text. Unknown values are rejected here,
/// never forwarded to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMode {
    Plain,
    Markdown,
    Html,
}

impl FormatMode {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "" | "none" | "plain" => Ok(Self::Plain),
            other => Err(ValidationError::new(format!(
                "parse_mode must be one of Markdown, HTML, None (got `{other}`)"
            ))),
        }
    }

    /// Wire value for the Bot API; plain text sends no parse_mode at all.
    pub fn as_wire(self) -> Option<&'static str> {
        match self {
            Self::Markdown => Some("Markdown"),
            Self::Html => Some("HTML"),
            Self::Plain => None,
        }
    }
}

/// A resolved conversation target. Send actions never run without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTarget(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct SendMessageArgs {
    pub chat: ChatTarget,
    pub text: String,
    pub mode: FormatMode,
    pub disable_notification: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendPhotoArgs {
    pub chat: ChatTarget,
    pub photo_url: String,
    pub caption: Option<String>,
    pub mode: FormatMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendDocumentArgs {
    pub chat: ChatTarget,
    pub document_url: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetUpdatesArgs {
    pub limit: i64,
    pub timeout: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetChatInfoArgs {
    pub chat: ChatTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetWebhookArgs {
    pub url: String,
    pub ip_address: Option<String>,
    pub max_connections: Option<i64>,
    pub allowed_updates: Option<Vec<String>>,
}

/// The closed action set, each variant carrying its validated arguments.
/// Dispatch is an exhaustive match, so adding an action without handling it
/// is a compile error.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SendMessage(SendMessageArgs),
    SendPhoto(SendPhotoArgs),
    SendDocument(SendDocumentArgs),
    GetUpdates(GetUpdatesArgs),
    GetBotInfo,
    GetChatInfo(GetChatInfoArgs),
    SetWebhook(SetWebhookArgs),
    DeleteWebhook,
    GetWebhookInfo,
}

impl Action {
    /// Converts an untyped argument bag into a typed action, applying
    /// declared defaults. Anything past this point is fully validated.
    pub fn parse(
        name: &str,
        args: &Value,
        default_chat_id: Option<&str>,
    ) -> Result<Self, ValidationError> {
        match name {
            "telegram_send_message" => parse_send_message(args, default_chat_id),
            "telegram_send_photo" => parse_send_photo(args, default_chat_id),
            "telegram_send_document" => parse_send_document(args, default_chat_id),
            "telegram_get_updates" => parse_get_updates(args),
            "telegram_get_bot_info" => Ok(Self::GetBotInfo),
            "telegram_get_chat_info" => Ok(Self::GetChatInfo(GetChatInfoArgs {
                chat: explicit_chat_target(args)?,
            })),
            "telegram_set_webhook" => parse_set_webhook(args),
            "telegram_delete_webhook" => Ok(Self::DeleteWebhook),
            "telegram_get_webhook_info" => Ok(Self::GetWebhookInfo),
            other => Err(ValidationError::new(format!("unknown action `{other}`"))),
        }
    }
}

fn parse_send_message(args: &Value, default_chat_id: Option<&str>) -> Result<Action, ValidationError> {
    Ok(Action::SendMessage(SendMessageArgs {
        chat: resolve_chat_target(args, default_chat_id)?,
        text: required_str(args, "text")?,
        mode: parse_format_mode(args)?,
        disable_notification: optional_bool(args, "disable_notification", false)?,
    }))
}

fn parse_send_photo(args: &Value, default_chat_id: Option<&str>) -> Result<Action, ValidationError> {
    Ok(Action::SendPhoto(SendPhotoArgs {
        chat: resolve_chat_target(args, default_chat_id)?,
        photo_url: required_str(args, "photo_url")?,
        caption: optional_str(args, "caption")?,
        mode: parse_format_mode(args)?,
    }))
}

fn parse_send_document(
    args: &Value,
    default_chat_id: Option<&str>,
) -> Result<Action, ValidationError> {
    Ok(Action::SendDocument(SendDocumentArgs {
        chat: resolve_chat_target(args, default_chat_id)?,
        document_url: required_str(args, "document_url")?,
        caption: optional_str(args, "caption")?,
    }))
}

fn parse_get_updates(args: &Value) -> Result<Action, ValidationError> {
    let limit = optional_int(args, "limit", DEFAULT_UPDATE_LIMIT)?;
    if !(UPDATE_LIMIT_MIN..=UPDATE_LIMIT_MAX).contains(&limit) {
        return Err(ValidationError::new(format!(
            "limit must be between {UPDATE_LIMIT_MIN} and {UPDATE_LIMIT_MAX} (got {limit})"
        )));
    }
    let timeout = optional_int(args, "timeout", DEFAULT_POLL_TIMEOUT_SECS)?;
    if timeout < 0 {
        return Err(ValidationError::new(format!(
            "timeout must not be negative (got {timeout})"
        )));
    }
    Ok(Action::GetUpdates(GetUpdatesArgs { limit, timeout }))
}

fn parse_set_webhook(args: &Value) -> Result<Action, ValidationError> {
    let raw_url = required_str(args, "url")?;
    let parsed = Url::parse(&raw_url)
        .map_err(|err| ValidationError::new(format!("url is not a valid URL: {err}")))?;
    if parsed.scheme() != "https" {
        return Err(ValidationError::new(format!(
            "webhook url must use https (got scheme `{}`)",
            parsed.scheme()
        )));
    }
    let max_connections = match args.get("max_connections").filter(|v| !v.is_null()) {
        Some(value) => {
            let n = value.as_i64().ok_or_else(|| {
                ValidationError::new("max_connections must be an integer".to_owned())
            })?;
            if !(1..=100).contains(&n) {
                return Err(ValidationError::new(format!(
                    "max_connections must be between 1 and 100 (got {n})"
                )));
            }
            Some(n)
        }
        None => None,
    };
    Ok(Action::SetWebhook(SetWebhookArgs {
        url: raw_url,
        ip_address: optional_str(args, "ip_address")?,
        max_connections,
        allowed_updates: optional_str_array(args, "allowed_updates")?,
    }))
}

fn parse_format_mode(args: &Value) -> Result<FormatMode, ValidationError> {
    match optional_str(args, "parse_mode")? {
        Some(raw) => FormatMode::parse(&raw),
        None => Ok(FormatMode::Markdown),
    }
}

/// Explicit `chat_id` wins; otherwise the configured default. Neither
/// present is a validation failure, reported before any network call.
fn resolve_chat_target(
    args: &Value,
    default_chat_id: Option<&str>,
) -> Result<ChatTarget, ValidationError> {
    if let Some(value) = args.get("chat_id").filter(|v| !v.is_null()) {
        return chat_target_from_value(value);
    }
    match default_chat_id {
        Some(id) => Ok(ChatTarget(id.to_owned())),
        None => Err(ValidationError::new(
            "no chat_id provided and no default chat id is configured".to_owned(),
        )),
    }
}

fn explicit_chat_target(args: &Value) -> Result<ChatTarget, ValidationError> {
    match args.get("chat_id").filter(|v| !v.is_null()) {
        Some(value) => chat_target_from_value(value),
        None => Err(ValidationError::new(
            "missing required field `chat_id`".to_owned(),
        )),
    }
}

fn chat_target_from_value(value: &Value) -> Result<ChatTarget, ValidationError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(ChatTarget(s.trim().to_owned())),
        Value::String(_) => Err(ValidationError::new("chat_id must not be empty".to_owned())),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(ChatTarget(n.to_string())),
        _ => Err(ValidationError::new(
            "chat_id must be a string or integer".to_owned(),
        )),
    }
}

fn required_str(args: &Value, key: &str) -> Result<String, ValidationError> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(ValidationError::new(format!("`{key}` must not be empty"))),
        Some(_) => Err(ValidationError::new(format!("`{key}` must be a string"))),
        None => Err(ValidationError::new(format!(
            "missing required field `{key}`"
        ))),
    }
}

fn optional_str(args: &Value, key: &str) -> Result<Option<String>, ValidationError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::new(format!("`{key}` must be a string"))),
    }
}

fn optional_bool(args: &Value, key: &str, default: bool) -> Result<bool, ValidationError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ValidationError::new(format!("`{key}` must be a boolean"))),
    }
}

fn optional_int(args: &Value, key: &str, default: i64) -> Result<i64, ValidationError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| ValidationError::new(format!("`{key}` must be an integer"))),
    }
}

fn optional_str_array(args: &Value, key: &str) -> Result<Option<Vec<String>>, ValidationError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => out.push(s.to_owned()),
                    None => {
                        return Err(ValidationError::new(format!(
                            "`{key}` must be an array of strings"
                        )))
                    }
                }
            }
            Ok(Some(out))
        }
        Some(_) => Err(ValidationError::new(format!(
            "`{key}` must be an array of strings"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ActionCatalog;
    use serde_json::json;

    #[test]
    fn send_message_applies_defaults() {
        let action = Action::parse(
            "telegram_send_message",
            &json!({"text": "hi", "chat_id": "42"}),
            None,
        )
        .expect("valid args");
        match action {
            Action::SendMessage(args) => {
                assert_eq!(args.chat, ChatTarget("42".to_owned()));
                assert_eq!(args.mode, FormatMode::Markdown);
                assert!(!args.disable_notification);
            }
            other => panic!("expected SendMessage, got {other:?}"),
        }
    }

    #[test]
    fn send_message_falls_back_to_default_chat() {
        let action =
            Action::parse("telegram_send_message", &json!({"text": "hi"}), Some("-100"))
                .expect("default chat resolves");
        match action {
            Action::SendMessage(args) => assert_eq!(args.chat.0, "-100"),
            other => panic!("expected SendMessage, got {other:?}"),
        }
    }

    #[test]
    fn send_message_without_any_destination_is_rejected() {
        let err = Action::parse("telegram_send_message", &json!({"text": "hi"}), None)
            .expect_err("no destination");
        assert!(err.to_string().contains("no default chat id"));
    }

    #[test]
    fn integer_chat_id_is_accepted() {
        let action = Action::parse(
            "telegram_send_message",
            &json!({"text": "hi", "chat_id": -1009876}),
            None,
        )
        .expect("integer chat id");
        match action {
            Action::SendMessage(args) => assert_eq!(args.chat.0, "-1009876"),
            other => panic!("expected SendMessage, got {other:?}"),
        }
    }

    #[test]
    fn bogus_parse_mode_is_rejected_locally() {
        let err = Action::parse(
            "telegram_send_message",
            &json!({"text": "hi", "chat_id": "1", "parse_mode": "bogus"}),
            None,
        )
        .expect_err("bogus mode");
        assert!(err.to_string().contains("parse_mode"));
    }

    #[test]
    fn parse_mode_is_case_insensitive_and_normalized() {
        for raw in ["Markdown", "markdown", "MARKDOWN"] {
            let action = Action::parse(
                "telegram_send_message",
                &json!({"text": "hi", "chat_id": "1", "parse_mode": raw}),
                None,
            )
            .expect("markdown variants accepted");
            match action {
                Action::SendMessage(args) => assert_eq!(args.mode.as_wire(), Some("Markdown")),
                other => panic!("expected SendMessage, got {other:?}"),
            }
        }
        assert_eq!(FormatMode::parse("html").unwrap().as_wire(), Some("HTML"));
        assert_eq!(FormatMode::parse("None").unwrap().as_wire(), None);
    }

    #[test]
    fn missing_required_text_is_rejected() {
        let err = Action::parse("telegram_send_message", &json!({"chat_id": "1"}), None)
            .expect_err("text required");
        assert!(err.to_string().contains("`text`"));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = Action::parse(
            "telegram_send_message",
            &json!({"text": 7, "chat_id": "1"}),
            None,
        )
        .expect_err("text must be a string");
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn get_updates_defaults_and_bounds() {
        match Action::parse("telegram_get_updates", &json!({}), None).expect("defaults") {
            Action::GetUpdates(args) => {
                assert_eq!(args.limit, 10);
                assert_eq!(args.timeout, 0);
            }
            other => panic!("expected GetUpdates, got {other:?}"),
        }
        assert!(Action::parse("telegram_get_updates", &json!({"limit": 0}), None).is_err());
        assert!(Action::parse("telegram_get_updates", &json!({"limit": 101}), None).is_err());
        assert!(Action::parse("telegram_get_updates", &json!({"timeout": -1}), None).is_err());
        assert!(Action::parse("telegram_get_updates", &json!({"limit": "ten"}), None).is_err());
    }

    #[test]
    fn chat_info_requires_explicit_chat_id() {
        let err = Action::parse("telegram_get_chat_info", &json!({}), Some("-100"))
            .expect_err("chat_id required");
        assert!(err.to_string().contains("`chat_id`"));
    }

    #[test]
    fn set_webhook_enforces_https() {
        assert!(Action::parse(
            "telegram_set_webhook",
            &json!({"url": "https://example.test/hook"}),
            None
        )
        .is_ok());
        let err = Action::parse(
            "telegram_set_webhook",
            &json!({"url": "http://example.test/hook"}),
            None,
        )
        .expect_err("http rejected");
        assert!(err.to_string().contains("https"));
        assert!(
            Action::parse("telegram_set_webhook", &json!({"url": "not a url"}), None).is_err()
        );
    }

    #[test]
    fn set_webhook_validates_optional_fields() {
        match Action::parse(
            "telegram_set_webhook",
            &json!({
                "url": "https://example.test/hook",
                "allowed_updates": ["message", "callback_query"],
                "max_connections": 40
            }),
            None,
        )
        .expect("full args")
        {
            Action::SetWebhook(args) => {
                assert_eq!(args.max_connections, Some(40));
                assert_eq!(
                    args.allowed_updates.as_deref(),
                    Some(["message".to_owned(), "callback_query".to_owned()].as_slice())
                );
            }
            other => panic!("expected SetWebhook, got {other:?}"),
        }
        assert!(Action::parse(
            "telegram_set_webhook",
            &json!({"url": "https://example.test/hook", "max_connections": 0}),
            None
        )
        .is_err());
        assert!(Action::parse(
            "telegram_set_webhook",
            &json!({"url": "https://example.test/hook", "allowed_updates": [1]}),
            None
        )
        .is_err());
    }

    #[test]
    fn unknown_action_names_are_rejected() {
        let err =
            Action::parse("telegram_teleport", &json!({}), None).expect_err("unknown action");
        assert!(err.to_string().contains("unknown action"));
    }

    #[test]
    fn every_catalog_entry_has_a_typed_counterpart() {
        for spec in ActionCatalog::new().entries() {
            let outcome = Action::parse(spec.name, &json!({"_probe": true}), Some("1"));
            if let Err(err) = outcome {
                assert!(
                    !err.to_string().contains("unknown action"),
                    "{} is cataloged but not dispatchable",
                    spec.name
                );
            }
        }
    }
}
