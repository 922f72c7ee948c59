//! MCP (Model Context Protocol) server implementation
//!
//! Newline-delimited JSON-RPC 2.0 over stdio.

mod args;
mod protocol;
mod tools;

pub use args::*;
pub use protocol::*;
pub use tools::*;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Protocol revision advertised in `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Requests slower than this are logged as warnings
const SLOW_REQUEST_MS: u128 = 1000;

/// MCP Server for Mailroom
#[derive(Clone)]
pub struct McpServer {
    tools: ToolHandler,
}

impl McpServer {
    pub fn new(tools: ToolHandler) -> Self {
        Self { tools }
    }

    /// Run the MCP server on stdio until EOF
    pub async fn run(&self) -> Result<()> {
        info!("Starting MCP server on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve requests from `reader`, writing one response line per request.
    ///
    /// Each request runs on its own task, so a slow tool call does not hold
    /// up the requests behind it. Responses go out in completion order
    /// through a single writer; in-flight requests are drained at EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Received EOF, shutting down");
                        break;
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    debug!("Received request: {}", line);

                    let request: JsonRpcRequest = match serde_json::from_str(line) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("Unparseable request: {}", e);
                            write_line(&mut writer, &parse_error(&e)).await?;
                            continue;
                        }
                    };

                    let server = self.clone();
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        let response = server.handle_request(&request).await;
                        if request.is_notification() {
                            debug!("No response for notification {}", request.method);
                            return;
                        }
                        // The receiver lives until every task has been joined
                        let _ = tx.send(response);
                    });
                }
                Some(response) = rx.recv() => {
                    write_line(&mut writer, &response).await?;
                }
                Some(joined) = in_flight.join_next() => {
                    if let Err(e) = joined {
                        error!("Request task failed: {}", e);
                    }
                }
            }
        }

        drop(tx);
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Request task failed: {}", e);
            }
        }
        while let Some(response) = rx.recv().await {
            write_line(&mut writer, &response).await?;
        }

        Ok(())
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let start = std::time::Instant::now();
        let method = &request.method;

        let request_desc = if method == "tools/call" {
            let tool_name = request
                .params
                .as_ref()
                .and_then(|p| p["name"].as_str())
                .unwrap_or("unknown");
            format!("tools/call:{}", tool_name)
        } else {
            method.clone()
        };

        info!("→ {}", request_desc);

        let result = match method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "initialized" | "notifications/initialized" => Ok(Value::Null),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            _ => Err(Error::McpProtocol(format!("Unknown method: {}", method))),
        };

        let elapsed_ms = start.elapsed().as_millis();

        match result {
            Ok(value) => {
                let tool_failed = value.get("isError").and_then(Value::as_bool) == Some(true);
                if tool_failed {
                    error!("← {} ERROR ({}ms)", request_desc, elapsed_ms);
                } else if elapsed_ms > SLOW_REQUEST_MS {
                    warn!("← {} OK ({}ms) SLOW", request_desc, elapsed_ms);
                } else {
                    info!("← {} OK ({}ms)", request_desc, elapsed_ms);
                }
                JsonRpcResponse::success(request.id.clone(), value)
            }
            Err(e) => {
                error!("← {} ERROR ({}ms): {}", request_desc, elapsed_ms, e);
                JsonRpcResponse::failure(
                    request.id.clone(),
                    JsonRpcError {
                        code: rpc_code(&e),
                        message: e.to_string(),
                        data: Some(serde_json::json!({
                            "code": e.mcp_code(),
                            "action": e.action_hint()
                        })),
                    },
                )
            }
        }
    }

    fn handle_initialize(&self, params: &Option<Value>) -> Result<Value> {
        if let Some(client) = params.as_ref().and_then(|p| p.get("clientInfo")) {
            info!("Client connected: {}", client);
        }
        Ok(serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": crate::APP_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {}
            }
        }))
    }

    fn handle_tools_list(&self) -> Result<Value> {
        Ok(serde_json::json!({
            "tools": get_tool_definitions()
        }))
    }

    async fn handle_tools_call(&self, params: &Option<Value>) -> Result<Value> {
        let params = params
            .as_ref()
            .ok_or_else(|| Error::InvalidRequest("Missing params".to_string()))?;

        let name = params["name"]
            .as_str()
            .ok_or_else(|| Error::InvalidRequest("Missing tool name".to_string()))?;

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Object(Default::default()));

        let result = self.tools.dispatch(name, &arguments).await;
        Ok(serde_json::to_value(result)?)
    }
}

/// JSON-RPC error code for a protocol-level failure
fn rpc_code(error: &Error) -> i32 {
    match error {
        Error::McpProtocol(_) => -32601,
        Error::InvalidRequest(_) => -32602,
        _ => -32000,
    }
}

fn parse_error(e: &serde_json::Error) -> JsonRpcResponse {
    JsonRpcResponse::failure(
        None,
        JsonRpcError {
            code: -32700,
            message: format!("Parse error: {}", e),
            data: None,
        },
    )
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, response: &JsonRpcResponse) -> Result<()> {
    let response_json = serde_json::to_string(response)?;
    debug!("Sending response: {}", response_json);
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
