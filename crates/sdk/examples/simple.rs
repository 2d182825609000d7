//! Simple SDK Example
//!
//! Demonstrates basic usage of the Coderelay SDK.
//!
//! # Usage
//!
//! 1. Start the daemon:
//!    ```bash
//!    OPENAI_API_KEY=sk-... cargo run --package coderelay-daemon
//!    ```
//!
//! 2. Run this example:
//!    ```bash
//!    cargo run --example simple
//!    ```

use coderelay_sdk::{CoderelayClient, CodexRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Coderelay SDK - Simple Example");
    println!("==============================\n");

    // 1. Connect to daemon
    println!("1. Connecting to daemon...");
    let client = CoderelayClient::connect("http://127.0.0.1:9537").await?;

    let init = client.initialize().await?;
    println!(
        "   ✓ Connected to {} v{} (protocol {})\n",
        init.server_info.name, init.server_info.version, init.protocol_version
    );

    // 2. Discover tools
    println!("2. Listing tools...");
    let tools = client.list_tools().await?;
    for tool in &tools.tools {
        println!("   - {}: {}", tool.name, tool.description);
    }
    println!();

    // 3. Call codex
    println!("3. Calling codex...");
    let result = client
        .call_codex(
            CodexRequest::new("Say hello in one short sentence.")
                .with_model("gpt-5-codex")
                .with_reasoning_effort("low"),
        )
        .await?;

    if result.is_error() {
        println!("   ✗ codex failed: {}", result.text().unwrap_or_default());
    } else {
        println!("   ✓ codex replied:\n");
        println!("{}", result.text().unwrap_or_default());
    }

    println!("\n✓ Example completed successfully!");

    Ok(())
}
