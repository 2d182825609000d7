//! Coderelay Client Implementation

use crate::error::{Result, SdkError};
use crate::types::{CallToolResponse, CodexRequest, InitializeResponse, ListToolsResponse};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use std::time::Duration;

/// The request timeout must sit above the daemon's 300 s invocation budget
/// or long codex runs would be cut off client-side first.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(330);

/// Coderelay daemon client
///
/// # Example
///
/// ```no_run
/// use coderelay_sdk::{CoderelayClient, CodexRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = CoderelayClient::connect("http://127.0.0.1:9537").await?;
/// let result = client.call_codex(CodexRequest::new("review this diff")).await?;
/// println!("{}", result.text().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
pub struct CoderelayClient {
    client: HttpClient,
}

impl CoderelayClient {
    /// Connect to a Coderelay daemon
    ///
    /// # Arguments
    ///
    /// * `url` - RPC endpoint URL (e.g., `http://127.0.0.1:9537`)
    pub async fn connect(url: impl AsRef<str>) -> Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Connect with a custom request timeout
    pub async fn connect_with_timeout(url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let url = url.as_ref();

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(url)
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client })
    }

    /// Perform the initialize handshake
    pub async fn initialize(&self) -> Result<InitializeResponse> {
        let response: InitializeResponse =
            self.client.request("initialize", ObjectParams::new()).await?;
        Ok(response)
    }

    /// List the tools the daemon exposes
    pub async fn list_tools(&self) -> Result<ListToolsResponse> {
        let response: ListToolsResponse =
            self.client.request("tools/list", ObjectParams::new()).await?;
        Ok(response)
    }

    /// Call the codex tool
    ///
    /// A failed invocation (non-zero exit, timeout, ...) comes back as a
    /// normal response with `is_error()` set; only protocol-level faults
    /// (unknown tool, bad arguments, throttling) surface as `SdkError::Rpc`.
    pub async fn call_codex(&self, request: CodexRequest) -> Result<CallToolResponse> {
        let mut params = ObjectParams::new();
        params
            .insert("name", "codex")
            .map_err(|e| SdkError::Other(e.to_string()))?;
        params
            .insert("arguments", request)
            .map_err(|e| SdkError::Other(e.to_string()))?;

        let response: CallToolResponse = self.client.request("tools/call", params).await?;
        Ok(response)
    }

    /// Check daemon liveness
    pub async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self.client.request("ping", ObjectParams::new()).await?;
        Ok(())
    }
}
