use serde_json::{json, Value};

pub const DEFAULT_PARSE_MODE: &str = "Markdown";
pub const DEFAULT_UPDATE_LIMIT: i64 = 10;
pub const UPDATE_LIMIT_MIN: i64 = 1;
pub const UPDATE_LIMIT_MAX: i64 = 100;
pub const DEFAULT_POLL_TIMEOUT_SECS: i64 = 0;

/// One callable action: wire name, human description, and the JSON-Schema
/// declaration of its argument object.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

/// The closed set of callable actions. Built once at startup, read-only
/// afterwards, performs no I/O.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    entries: Vec<ActionSpec>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self {
            entries: build_entries(),
        }
    }

    pub fn entries(&self) -> &[ActionSpec] {
        &self.entries
    }

    /// Catalog listing for the tool-call boundary.
    pub fn listing(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|spec| {
                    json!({
                        "name": spec.name,
                        "description": spec.description,
                        "inputSchema": spec.schema,
                    })
                })
                .collect(),
        )
    }
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn build_entries() -> Vec<ActionSpec> {
    vec![
        ActionSpec {
            name: "telegram_send_message",
            description: "Send a text message to a Telegram chat",
            schema: json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "The message text to send (supports Markdown)"
                    },
                    "chat_id": {
                        "type": "string",
                        "description": "Target chat ID (uses the configured default if omitted)"
                    },
                    "parse_mode": {
                        "type": "string",
                        "description": "Parse mode for the message",
                        "enum": ["Markdown", "HTML", "None"],
                        "default": DEFAULT_PARSE_MODE
                    },
                    "disable_notification": {
                        "type": "boolean",
                        "description": "Send the message silently",
                        "default": false
                    }
                },
                "required": ["text"]
            }),
        },
        ActionSpec {
            name: "telegram_send_photo",
            description: "Send a photo to a Telegram chat",
            schema: json!({
                "type": "object",
                "properties": {
                    "photo_url": {
                        "type": "string",
                        "description": "URL or file identifier of the photo to send"
                    },
                    "caption": {
                        "type": "string",
                        "description": "Optional caption for the photo"
                    },
                    "chat_id": {
                        "type": "string",
                        "description": "Target chat ID (uses the configured default if omitted)"
                    },
                    "parse_mode": {
                        "type": "string",
                        "description": "Parse mode for the caption",
                        "enum": ["Markdown", "HTML", "None"],
                        "default": DEFAULT_PARSE_MODE
                    }
                },
                "required": ["photo_url"]
            }),
        },
        ActionSpec {
            name: "telegram_send_document",
            description: "Send a document/file to a Telegram chat",
            schema: json!({
                "type": "object",
                "properties": {
                    "document_url": {
                        "type": "string",
                        "description": "URL or file identifier of the document to send"
                    },
                    "caption": {
                        "type": "string",
                        "description": "Optional caption for the document"
                    },
                    "chat_id": {
                        "type": "string",
                        "description": "Target chat ID (uses the configured default if omitted)"
                    }
                },
                "required": ["document_url"]
            }),
        },
        ActionSpec {
            name: "telegram_get_updates",
            description: "Get recent updates/messages delivered to the bot",
            schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of updates to retrieve",
                        "default": DEFAULT_UPDATE_LIMIT,
                        "minimum": UPDATE_LIMIT_MIN,
                        "maximum": UPDATE_LIMIT_MAX
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Long-poll wait in seconds",
                        "default": DEFAULT_POLL_TIMEOUT_SECS
                    }
                }
            }),
        },
        ActionSpec {
            name: "telegram_get_bot_info",
            description: "Get information about the bot account",
            schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ActionSpec {
            name: "telegram_get_chat_info",
            description: "Get information about a specific chat",
            schema: json!({
                "type": "object",
                "properties": {
                    "chat_id": {
                        "type": "string",
                        "description": "The chat ID to inspect"
                    }
                },
                "required": ["chat_id"]
            }),
        },
        ActionSpec {
            name: "telegram_set_webhook",
            description: "Register a webhook URL for update delivery",
            schema: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "HTTPS URL to send updates to"
                    },
                    "allowed_updates": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Update kinds to receive"
                    },
                    "ip_address": {
                        "type": "string",
                        "description": "Fixed IP to use instead of resolving the URL"
                    },
                    "max_connections": {
                        "type": "integer",
                        "description": "Maximum simultaneous webhook connections",
                        "minimum": 1,
                        "maximum": 100
                    }
                },
                "required": ["url"]
            }),
        },
        ActionSpec {
            name: "telegram_delete_webhook",
            description: "Remove the webhook and fall back to update polling",
            schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ActionSpec {
            name: "telegram_get_webhook_info",
            description: "Get current webhook status and configuration",
            schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn catalog_declares_nine_unique_actions() {
        let catalog = ActionCatalog::new();
        assert_eq!(catalog.entries().len(), 9);
        let names: BTreeSet<&str> = catalog.entries().iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), 9);
        assert!(names.contains("telegram_send_message"));
        assert!(names.contains("telegram_get_webhook_info"));
    }

    #[test]
    fn every_schema_is_an_object_with_properties() {
        for spec in ActionCatalog::new().entries() {
            assert_eq!(
                spec.schema.get("type").and_then(Value::as_str),
                Some("object"),
                "{} schema must be an object",
                spec.name
            );
            assert!(
                spec.schema.get("properties").is_some_and(Value::is_object),
                "{} schema must declare properties",
                spec.name
            );
        }
    }

    #[test]
    fn required_fields_are_declared_properties() {
        for spec in ActionCatalog::new().entries() {
            let properties = spec.schema["properties"].as_object().expect("properties");
            let required = spec
                .schema
                .get("required")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for field in required {
                let field = field.as_str().expect("required entries are strings");
                assert!(
                    properties.contains_key(field),
                    "{}.{field} is required but undeclared",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn listing_exposes_name_description_and_schema() {
        let listing = ActionCatalog::new().listing();
        let entries = listing.as_array().expect("listing is an array");
        assert_eq!(entries.len(), 9);
        for entry in entries {
            assert!(entry.get("name").is_some_and(Value::is_string));
            assert!(entry.get("description").is_some_and(Value::is_string));
            assert!(entry.get("inputSchema").is_some_and(Value::is_object));
        }
    }
}
