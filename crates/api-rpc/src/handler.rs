//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::rate_limiter::RateLimiter;
use crate::types::{
    CallToolRequest, CallToolResponse, Capabilities, CodexArgs, InitializeResponse,
    ListToolsResponse, ServerInfo, ToolDescriptor, ToolsCapability, PROTOCOL_VERSION,
};
use coderelay_core::application::invoker::ProcessInvoker;
use coderelay_core::domain::{EffortLevel, InvocationRequest};
use coderelay_core::error::AppError;
use coderelay_core::port::OutputStore;
use jsonrpsee::types::ErrorObjectOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the single exposed tool
pub const CODEX_TOOL: &str = "codex";

/// Per-call environment override for the invocation budget, in milliseconds
pub const TIMEOUT_ENV: &str = "CODERELAY_TIMEOUT_MS";

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    invoker: Arc<ProcessInvoker>,
    output_store: Arc<dyn OutputStore>,
    rate_limiter: Arc<RateLimiter>,
}

impl RpcHandler {
    pub fn new(invoker: Arc<ProcessInvoker>, output_store: Arc<dyn OutputStore>) -> Self {
        // Default: 200 burst, 100 req/sec (configurable via env)
        let max_burst: u32 = std::env::var("CODERELAY_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        let rate_per_sec: u32 = std::env::var("CODERELAY_RATE_LIMIT_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        Self {
            invoker,
            output_store,
            rate_limiter: Arc::new(RateLimiter::new(max_burst, rate_per_sec)),
        }
    }

    /// initialize
    pub async fn initialize(&self) -> Result<InitializeResponse, ErrorObjectOwned> {
        Ok(InitializeResponse {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Capabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "coderelay".to_string(),
                version: coderelay_core::VERSION.to_string(),
            },
        })
    }

    /// tools/list
    pub async fn list_tools(&self) -> Result<ListToolsResponse, ErrorObjectOwned> {
        Ok(ListToolsResponse {
            tools: vec![ToolDescriptor {
                name: CODEX_TOOL.to_string(),
                description: "Delegate a free-text request to the codex CLI and return its output"
                    .to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "prompt": {
                            "type": "string",
                            "description": "The full prompt to send to codex"
                        },
                        "model": {
                            "type": "string",
                            "description": "Backing model",
                            "default": "gpt-5-codex"
                        },
                        "reasoning_effort": {
                            "type": "string",
                            "enum": ["low", "medium", "high"],
                            "default": "high"
                        },
                        "output_file": {
                            "type": "string",
                            "description": "Optional path to also write the result to"
                        }
                    },
                    "required": ["prompt"]
                }),
            }],
        })
    }

    /// ping
    pub async fn ping(&self) -> Result<serde_json::Value, ErrorObjectOwned> {
        Ok(serde_json::json!({}))
    }

    /// tools/call
    ///
    /// Protocol-level faults (unknown tool, malformed arguments, throttling,
    /// persistence trouble) become JSON-RPC errors; failures of the codex
    /// invocation itself come back in-band as `isError` content, which is
    /// what tool-calling clients expect to relay to the user.
    pub async fn call_tool(
        &self,
        params: CallToolRequest,
    ) -> Result<CallToolResponse, ErrorObjectOwned> {
        // Rate limiting check (DoS protection)
        if !self.rate_limiter.check().await {
            return Err(jsonrpsee::types::error::ErrorObject::owned(
                4003, // THROTTLED
                "Rate limit exceeded. Please slow down.",
                None::<()>,
            ));
        }

        if params.name != CODEX_TOOL {
            return Err(to_rpc_error(AppError::NotFound(format!(
                "Unknown tool: {}",
                params.name
            ))));
        }

        let args: CodexArgs = serde_json::from_value(params.arguments)
            .map_err(|e| to_rpc_error(AppError::Validation(format!("Invalid arguments: {}", e))))?;

        let effort: EffortLevel = args
            .reasoning_effort
            .parse()
            .map_err(|e: coderelay_core::domain::DomainError| {
                to_rpc_error(AppError::Validation(e.to_string()))
            })?;

        // Precondition: refuse before any process is spawned
        if !self.invoker.credential_present() {
            return Err(to_rpc_error(AppError::Validation(
                "OPENAI_API_KEY is not configured on the server".to_string(),
            )));
        }

        // Read once per invocation
        let timeout_override_ms = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|ms| *ms > 0);

        let mut request = InvocationRequest::new(args.prompt, args.model).with_effort(effort);
        request.timeout_override_ms = timeout_override_ms;

        match self.invoker.invoke(request).await {
            Ok(output) => {
                if let Some(output_file) = &args.output_file {
                    self.output_store
                        .persist(Path::new(output_file), &output.stdout)
                        .await
                        .map_err(|e| {
                            warn!(path = %output_file, error = %e, "Failed to persist output");
                            to_rpc_error(AppError::Io(e))
                        })?;
                    info!(path = %output_file, "Invocation output persisted");
                }
                Ok(CallToolResponse::text(output.stdout))
            }
            Err(e) => Ok(CallToolResponse::error(format!("{}: {}", e.kind(), e))),
        }
    }
}
