//! Kips RPC interface
//!
//! Agents talk to kips over line-delimited JSON-RPC 2.0 on stdin/stdout. Each request is
//! handled to completion before its response is written; storage calls block the single
//! serving task.
//!
//! # Methods
//! - `initialize`, `ping`, `notifications/initialized`
//! - `resources/list`, `resources/read`
//! - `tools/list`, `tools/call`
//!
//! Tool failures (disallowed verb, engine error) are successful responses whose result
//! carries `isError: true`. JSON-RPC errors are reserved for protocol problems, unknown
//! methods or tools, bad params and missing resources.

use crate::core::error::KipsError;
use crate::core::store::Store;
use crate::plugins::gateway::{Gateway, SCHEMA_MIME_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

pub const JSONRPC_VERSION: &str = "2.0";
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "kips";

pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
}

/// JSON-RPC request envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<JsonValue>,
    pub method: String,
    #[serde(default)]
    pub params: JsonValue,
}

/// JSON-RPC response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: JsonValue,
}

#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

pub fn success_response(id: JsonValue, result: JsonValue) -> RpcResponse {
    RpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        result: Some(result),
        error: None,
    }
}

pub fn error_response(id: JsonValue, code: i64, message: impl Into<String>) -> RpcResponse {
    RpcResponse {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        result: None,
        error: Some(RpcError {
            code,
            message: message.into(),
            data: None,
        }),
    }
}

/// JSON-RPC error code for a failure coming out of the gateway.
pub fn error_code(err: &KipsError) -> i64 {
    match err {
        KipsError::UnknownTool(_) => codes::METHOD_NOT_FOUND,
        KipsError::ValidationError(_) | KipsError::JsonError(_) => codes::INVALID_PARAMS,
        KipsError::NotFound(_) => codes::RESOURCE_NOT_FOUND,
        _ => codes::INTERNAL_ERROR,
    }
}

fn from_error(id: JsonValue, err: KipsError) -> RpcResponse {
    error_response(id, error_code(&err), err.to_string())
}

/// Request handler bound to one open store.
pub struct RpcServer {
    store: Store,
}

impl RpcServer {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Give the store back so the caller can close it.
    pub fn into_store(self) -> Store {
        self.store
    }

    fn gateway(&self) -> Gateway<'_> {
        Gateway::new(self.store.conn())
    }

    /// Handle one decoded request. Notifications get no response.
    pub fn handle_request(&self, request: RpcRequest) -> Option<RpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "notification received");
            return None;
        };
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(error_response(
                id,
                codes::INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(JsonValue::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL_VERSION);
                success_response(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
                        "capabilities": { "resources": {}, "tools": {} }
                    }),
                )
            }
            "ping" => success_response(id, json!({})),
            "resources/list" => match self.gateway().list_resources() {
                Ok(resources) => success_response(id, json!({ "resources": resources })),
                Err(e) => from_error(id, e),
            },
            "resources/read" => self.handle_resources_read(id, request.params),
            "tools/list" => success_response(id, json!({ "tools": self.gateway().list_tools() })),
            "tools/call" => self.handle_tools_call(id, request.params),
            other => error_response(
                id,
                codes::METHOD_NOT_FOUND,
                format!("method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn handle_resources_read(&self, id: JsonValue, params: JsonValue) -> RpcResponse {
        let parsed: ResourceReadParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return error_response(id, codes::INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };
        let schema = match self.gateway().read_resource(&parsed.uri) {
            Ok(schema) => schema,
            Err(e) => return from_error(id, e),
        };
        match serde_json::to_string_pretty(&schema) {
            Ok(text) => success_response(
                id,
                json!({
                    "contents": [{
                        "uri": parsed.uri,
                        "mimeType": SCHEMA_MIME_TYPE,
                        "text": text
                    }]
                }),
            ),
            Err(e) => from_error(id, e.into()),
        }
    }

    fn handle_tools_call(&self, id: JsonValue, params: JsonValue) -> RpcResponse {
        let parsed: ToolCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return error_response(id, codes::INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };
        let result = self
            .gateway()
            .call_tool(&parsed.name, &parsed.arguments)
            .and_then(|r| serde_json::to_value(r).map_err(KipsError::from));
        match result {
            Ok(value) => success_response(id, value),
            Err(e) => from_error(id, e),
        }
    }

    /// Decode one protocol line and produce the serialized response, if any.
    pub fn handle_line(&self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let response = match serde_json::from_str::<JsonValue>(trimmed) {
            Err(err) => Some(error_response(
                JsonValue::Null,
                codes::PARSE_ERROR,
                format!("parse error: {err}"),
            )),
            Ok(value) => {
                let id = value.get("id").cloned().unwrap_or(JsonValue::Null);
                match serde_json::from_value::<RpcRequest>(value) {
                    Ok(request) => self.handle_request(request),
                    Err(err) => Some(error_response(
                        id,
                        codes::INVALID_REQUEST,
                        format!("invalid request: {err}"),
                    )),
                }
            }
        };
        let response = response?;
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(error = %err, "failed to serialize response");
                None
            }
        }
    }
}

/// Serve requests from `reader` until EOF or until `shutdown` resolves.
///
/// Lines are read as raw bytes; a line that is not UTF-8 gets a parse-error reply and
/// serving continues. Only a read or write failure ends the loop with an error.
pub async fn serve<R, W, F>(
    server: &RpcServer,
    mut reader: R,
    mut writer: W,
    shutdown: F,
) -> Result<(), KipsError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let mut buf = Vec::new();
    tokio::pin!(shutdown);
    loop {
        buf.clear();
        let read = tokio::select! {
            _ = &mut shutdown => None,
            read = reader.read_until(b'\n', &mut buf) => Some(read),
        };
        let Some(read) = read else {
            info!("shutdown signal received");
            break;
        };
        if read? == 0 {
            info!("input closed");
            break;
        }

        let reply = match std::str::from_utf8(&buf) {
            Ok(line) => server.handle_line(line),
            Err(err) => {
                warn!(error = %err, "request line is not valid UTF-8");
                serde_json::to_string(&error_response(
                    JsonValue::Null,
                    codes::PARSE_ERROR,
                    format!("parse error: {err}"),
                ))
                .ok()
            }
        };
        if let Some(reply) = reply {
            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

/// Serve on the process's stdin/stdout, stopping on SIGINT (and SIGTERM on unix).
pub async fn serve_stdio(server: &RpcServer) -> Result<(), KipsError> {
    info!(db = %server.store().path.display(), "rpc server running on stdio");
    serve(
        server,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown_signal(),
    )
    .await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, listening for SIGINT only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
