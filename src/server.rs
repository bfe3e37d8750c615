use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::gateway::Gateway;

const CONFIG_STATUS_URI: &str = "telegram://config/status";
const BOT_INFO_URI: &str = "telegram://bot/info";

/// One parsed request from the tool-call boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFrame {
    pub id: Value,
    pub method: String,
    pub params: Value,
}

pub fn parse_frame(line: &str) -> Result<RequestFrame, String> {
    let value: Value =
        serde_json::from_str(line).map_err(|err| format!("invalid JSON frame: {err}"))?;
    let method = value
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| "frame missing `method`".to_owned())?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let params = value.get("params").cloned().unwrap_or_else(|| json!({}));
    Ok(RequestFrame { id, method, params })
}

fn success_frame(id: &Value, result: Value) -> Value {
    json!({"id": id, "result": result})
}

fn error_frame(id: &Value, message: &str) -> Value {
    json!({"id": id, "error": {"message": message}})
}

/// Routes one frame. Per-call problems stay inside the returned frame; only
/// a fatal gateway failure (session bootstrap) escapes as `Err`.
pub async fn handle_frame(gateway: &Gateway, frame: RequestFrame) -> Result<Value, GatewayError> {
    match frame.method.as_str() {
        "tools/list" => Ok(success_frame(
            &frame.id,
            json!({"tools": gateway.catalog().listing()}),
        )),
        "tools/call" => {
            let Some(name) = frame.params.get("name").and_then(Value::as_str) else {
                return Ok(error_frame(&frame.id, "tools/call requires params.name"));
            };
            let arguments = frame
                .params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));
            let envelope = gateway.dispatch(name, &arguments).await?;
            Ok(success_frame(
                &frame.id,
                json!({
                    "content": [{"type": "text", "text": envelope.to_string()}]
                }),
            ))
        }
        "resources/list" => {
            let mut resources = vec![json!({
                "uri": CONFIG_STATUS_URI,
                "name": "Telegram Configuration Status",
                "mimeType": "application/json",
                "text": gateway.config_status().to_string(),
            })];
            if let Some(identity) = gateway.bot_identity().await {
                resources.push(json!({
                    "uri": BOT_INFO_URI,
                    "name": "Bot Information",
                    "mimeType": "application/json",
                    "text": identity.to_string(),
                }));
            }
            Ok(success_frame(&frame.id, json!({"resources": resources})))
        }
        other => Ok(error_frame(
            &frame.id,
            &format!("unsupported method `{other}`"),
        )),
    }
}

/// Serves newline-delimited JSON frames on stdio until EOF, ctrl-c, or a
/// fatal gateway failure. The transport is released on every exit path.
pub async fn serve(gateway: Arc<Gateway>) -> Result<()> {
    let result = serve_loop(&gateway, shutdown_signal()).await;
    gateway.shutdown().await;
    result
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler available; only EOF can stop the loop
        std::future::pending::<()>().await;
    }
}

async fn serve_loop(
    gateway: &Gateway,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    // registered once up front so a signal between reads is never dropped
    tokio::pin!(shutdown);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();
    info!("gateway serving on stdio");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_frame(&line) {
            Ok(frame) => {
                let frame_id = frame.id.clone();
                match handle_frame(gateway, frame).await {
                    Ok(response) => response,
                    Err(err) => {
                        // session bootstrap failed; nothing later can succeed
                        write_frame(&mut stdout, &error_frame(&frame_id, &err.to_string()))
                            .await?;
                        return Err(err.into());
                    }
                }
            }
            Err(message) => error_frame(&Value::Null, &message),
        };
        write_frame(&mut stdout, &response).await?;
    }
    Ok(())
}

async fn write_frame(stdout: &mut tokio::io::Stdout, frame: &Value) -> Result<()> {
    let mut text = frame.to_string();
    text.push('\n');
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn tokenless_gateway() -> Gateway {
        Gateway::new(Config::default())
    }

    #[test]
    fn parse_frame_extracts_id_method_and_params() {
        let frame = parse_frame(r#"{"id": 3, "method": "tools/list", "params": {"a": 1}}"#)
            .expect("valid frame");
        assert_eq!(frame.id, json!(3));
        assert_eq!(frame.method, "tools/list");
        assert_eq!(frame.params, json!({"a": 1}));
    }

    #[test]
    fn parse_frame_defaults_missing_id_and_params() {
        let frame = parse_frame(r#"{"method": "tools/list"}"#).expect("valid frame");
        assert_eq!(frame.id, Value::Null);
        assert_eq!(frame.params, json!({}));
    }

    #[test]
    fn parse_frame_rejects_garbage_and_missing_method() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"id": 1}"#)
            .unwrap_err()
            .contains("missing `method`"));
    }

    #[tokio::test]
    async fn tools_list_returns_the_full_catalog() {
        let gateway = tokenless_gateway();
        let frame = parse_frame(r#"{"id": 1, "method": "tools/list"}"#).unwrap();
        let response = handle_frame(&gateway, frame).await.expect("listing works");
        let tools = response["result"]["tools"].as_array().expect("tools array");
        assert_eq!(tools.len(), 9);
    }

    #[tokio::test]
    async fn unsupported_method_yields_error_frame() {
        let gateway = tokenless_gateway();
        let frame = parse_frame(r#"{"id": 2, "method": "tools/destroy"}"#).unwrap();
        let response = handle_frame(&gateway, frame).await.expect("handled");
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("unsupported method"));
    }

    #[tokio::test]
    async fn tools_call_requires_a_name() {
        let gateway = tokenless_gateway();
        let frame = parse_frame(r#"{"id": 4, "method": "tools/call", "params": {}}"#).unwrap();
        let response = handle_frame(&gateway, frame).await.expect("handled");
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("params.name"));
    }

    #[tokio::test]
    async fn invalid_arguments_come_back_as_failure_envelope_text() {
        // validation happens before the session exists, so even a tokenless
        // gateway answers with a well-formed frame
        let gateway = tokenless_gateway();
        let frame = parse_frame(
            r#"{"id": 5, "method": "tools/call", "params": {"name": "telegram_send_message", "arguments": {}}}"#,
        )
        .unwrap();
        let response = handle_frame(&gateway, frame).await.expect("handled");
        let text = response["result"]["content"][0]["text"]
            .as_str()
            .expect("text payload");
        let envelope: Value = serde_json::from_str(text).expect("envelope is JSON");
        assert_eq!(envelope["success"], json!(false));
    }

    #[tokio::test]
    async fn session_bootstrap_failure_is_fatal_for_the_call_path() {
        let gateway = tokenless_gateway();
        let frame = parse_frame(
            r#"{"id": 6, "method": "tools/call", "params": {"name": "telegram_get_bot_info"}}"#,
        )
        .unwrap();
        let err = handle_frame(&gateway, frame)
            .await
            .expect_err("no credential, no session");
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[tokio::test]
    async fn serve_loop_exits_cleanly_on_an_already_delivered_shutdown() {
        let gateway = tokenless_gateway();
        serve_loop(&gateway, std::future::ready(()))
            .await
            .expect("clean exit");
    }

    #[tokio::test]
    async fn resources_list_omits_bot_info_without_a_session() {
        let gateway = tokenless_gateway();
        let frame = parse_frame(r#"{"id": 7, "method": "resources/list"}"#).unwrap();
        let response = handle_frame(&gateway, frame).await.expect("handled");
        let resources = response["result"]["resources"]
            .as_array()
            .expect("resources array");
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0]["uri"], json!(CONFIG_STATUS_URI));
        let status: Value =
            serde_json::from_str(resources[0]["text"].as_str().unwrap()).expect("status JSON");
        assert_eq!(status["bot_token_configured"], json!(false));
    }
}
