use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::{LogQueryError, Result};
use crate::model::{ExportParams, SearchParams, TailParams, ToolOutput, TraceParams};
use crate::search::SearchEngine;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub async fn run_stdio(engine: Arc<SearchEngine>) -> Result<()> {
    info!("serving MCP over stdio");
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(engine, stdin, stdout).await
}

/// Newline-delimited JSON-RPC loop; one response line per request with an id.
pub async fn serve_lines<R, W>(engine: Arc<SearchEngine>, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        // Invalid UTF-8 is answered with a parse error like any other bad line.
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let req: RpcRequest = match serde_json::from_slice(&buf) {
            Ok(r) => r,
            Err(e) => {
                let resp = RpcResponse::err(Value::Null, PARSE_ERROR, format!("parse error: {e}"));
                write_response(&mut writer, &resp).await?;
                continue;
            }
        };

        if let Some(resp) = process_request(&engine, req).await {
            write_response(&mut writer, &resp).await?;
        }
    }
    info!("stdin closed, stopping");
    Ok(())
}

/// Dispatches one request. Notifications (no id) get no response.
pub async fn process_request(engine: &SearchEngine, req: RpcRequest) -> Option<RpcResponse> {
    debug!(method = %req.method, "rpc request");
    let is_notification = req.id.is_null();

    let resp = match req.method.as_str() {
        "initialize" => RpcResponse::ok(req.id, initialize_result()),
        "notifications/initialized" | "notifications/cancelled" => return None,
        "ping" => RpcResponse::ok(req.id, json!({})),
        "tools/list" => RpcResponse::ok(req.id, json!({ "tools": tool_definitions() })),
        "tools/call" => handle_call(engine, req.id, req.params).await,
        _ if is_notification => return None,
        other => {
            warn!(method = other, "unknown method");
            RpcResponse::err(req.id, METHOD_NOT_FOUND, format!("method not found: {other}"))
        }
    };
    Some(resp)
}

async fn handle_call(engine: &SearchEngine, id: Value, params: Value) -> RpcResponse {
    let call: CallParams = match parse_params(params) {
        Ok(c) => c,
        Err(e) => return RpcResponse::err(id, INVALID_PARAMS, e.to_string()),
    };
    info!(tool = %call.name, "tool call");

    let output = match call.name.as_str() {
        "search_logs" => match parse_params::<SearchParams>(call.arguments) {
            Ok(p) => engine.search_logs(p).await,
            Err(e) => return RpcResponse::err(id, INVALID_PARAMS, e.to_string()),
        },
        "tail_logs" => match parse_params::<TailParams>(call.arguments) {
            Ok(p) => engine.tail_logs(p).await,
            Err(e) => return RpcResponse::err(id, INVALID_PARAMS, e.to_string()),
        },
        "get_logs_by_trace_id" => match parse_params::<TraceParams>(call.arguments) {
            Ok(p) => engine.logs_by_trace_id(p).await,
            Err(e) => return RpcResponse::err(id, INVALID_PARAMS, e.to_string()),
        },
        "export_logs" => match parse_params::<ExportParams>(call.arguments) {
            Ok(p) => engine.export_logs(p).await,
            Err(e) => return RpcResponse::err(id, INVALID_PARAMS, e.to_string()),
        },
        other => return RpcResponse::err(id, INVALID_PARAMS, format!("unknown tool: {other}")),
    };

    RpcResponse::ok(id, tool_result(&output))
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params)
        .map_err(|e| LogQueryError::InvalidRequest(format!("invalid params: {e}")))
}

pub fn tool_result(output: &ToolOutput) -> Value {
    json!({
        "content": [{ "type": "text", "text": output.text }],
        "isError": output.is_error,
    })
}

async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, resp: &RpcResponse) -> Result<()> {
    let line = serde_json::to_string(resp).unwrap_or_else(|_| "{}".to_string());
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

pub fn tool_definitions() -> Vec<Value> {
    let relative = "Relative token (1h, 2h, 4h, 6h, 12h, 24h, 1d, 2d, 3d, 7d, 14d, 30d) or an absolute timestamp";
    vec![
        json!({
            "name": "search_logs",
            "description": "Search logs with free text or filter syntax. Natural language is rewritten into a filter query.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Free text or filter syntax (service:web AND status:error)" },
                    "from": { "type": "string", "description": relative, "default": "1h" },
                    "to": { "type": "string", "description": "Absolute end time; defaults to now" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 1000, "default": 1000 },
                    "sort": { "type": "string", "enum": ["asc", "desc"], "default": "desc" },
                    "format": { "type": "string", "enum": ["table", "json"], "default": "table" }
                },
                "required": ["query"]
            }
        }),
        json!({
            "name": "tail_logs",
            "description": "Fetch the most recent logs. follow only labels the result; no stream is kept open.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Optional filter; all logs when empty" },
                    "since": { "type": "string", "description": "Start of the window; defaults to the last 60 seconds" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 1000 },
                    "follow": { "type": "boolean", "default": false }
                }
            }
        }),
        json!({
            "name": "get_logs_by_trace_id",
            "description": "All logs for one trace id in chronological order, with trace columns.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "trace_id": { "type": "string" },
                    "from": { "type": "string", "description": relative, "default": "24h" },
                    "to": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 1000 },
                    "sort": { "type": "string", "enum": ["asc", "desc"], "default": "asc" }
                },
                "required": ["trace_id"]
            }
        }),
        json!({
            "name": "export_logs",
            "description": "Export matching logs to a CSV or JSON file in the export directory.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "from": { "type": "string", "description": relative, "default": "1h" },
                    "to": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 1000 },
                    "format": { "type": "string", "enum": ["csv", "json"], "default": "csv" },
                    "destination": { "type": "string", "description": "File name inside the export directory" }
                },
                "required": ["query"]
            }
        }),
    ]
}
