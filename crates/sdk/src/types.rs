//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from the api-rpc crate.

use serde::{Deserialize, Serialize};

/// Result of the initialize handshake
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub protocol_version: String,
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// One discoverable tool
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

/// A codex tool call
#[derive(Debug, Clone, Serialize)]
pub struct CodexRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

impl CodexRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            reasoning_effort: None,
            output_file: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    pub fn with_output_file(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self
    }
}

/// One block of tool-call result content
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Result of a tool call
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolResponse {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: Option<bool>,
}

impl CallToolResponse {
    /// Whether the call failed in-band
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// The first text block, which is where the codex output lives
    pub fn text(&self) -> Option<&str> {
        self.content.first().map(|ContentBlock::Text { text }| text.as_str())
    }
}
