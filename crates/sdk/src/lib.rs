//! Coderelay SDK - Rust Client Library
//!
//! Provides a convenient client for the Coderelay daemon.
//!
//! # Example
//!
//! ```no_run
//! use coderelay_sdk::{CoderelayClient, CodexRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect to daemon
//!     let client = CoderelayClient::connect("http://127.0.0.1:9537").await?;
//!
//!     // Delegate a prompt to codex
//!     let result = client
//!         .call_codex(CodexRequest::new("Summarize the repository layout"))
//!         .await?;
//!
//!     println!("{}", result.text().unwrap_or_default());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::CoderelayClient;
pub use error::{Result, SdkError};
pub use types::{
    CallToolResponse, CodexRequest, ContentBlock, InitializeResponse, ListToolsResponse,
    ServerInfo, ToolDescriptor,
};
