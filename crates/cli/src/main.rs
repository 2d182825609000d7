//! Coderelay CLI - Command-line interface for the Coderelay daemon
//! Talks JSON-RPC to a running coderelayd

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Read;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9537";

#[derive(Parser)]
#[command(name = "coderelay")]
#[command(about = "Coderelay CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "CODERELAY_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to codex and print its output
    Exec {
        /// The prompt text, or "-" to read it from stdin
        prompt: String,

        /// Backing model
        #[arg(short, long, default_value = "gpt-5-codex")]
        model: String,

        /// Reasoning effort (low, medium, high)
        #[arg(short, long, default_value = "high")]
        effort: String,

        /// Also write the result to this file on the daemon host
        #[arg(short, long)]
        output_file: Option<String>,
    },

    /// List the tools the daemon exposes
    Tools,

    /// Check daemon liveness
    Ping,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct ToolRow {
    name: String,
    description: String,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Exec {
            prompt,
            model,
            effort,
            output_file,
        } => {
            // "-" reads the prompt from stdin so large prompts never hit
            // the shell's argument limits
            let prompt = if prompt == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read prompt from stdin")?;
                buf
            } else {
                prompt
            };

            let mut arguments = json!({
                "prompt": prompt,
                "model": model,
                "reasoning_effort": effort,
            });
            if let Some(output_file) = output_file {
                arguments["output_file"] = json!(output_file);
            }

            let params = json!({
                "name": "codex",
                "arguments": arguments,
            });

            let result = call_rpc(&cli.rpc_url, "tools/call", params).await?;

            let text = result["content"][0]["text"].as_str().unwrap_or_default();
            let is_error = result["isError"].as_bool().unwrap_or(false);

            if is_error {
                eprintln!("{} {}", "✗ codex failed:".red().bold(), text);
                std::process::exit(1);
            }

            // The result text goes to stdout verbatim so it can be piped
            println!("{}", text);
        }

        Commands::Tools => {
            let result = call_rpc(&cli.rpc_url, "tools/list", json!({})).await?;

            let tools: Vec<ToolRow> = serde_json::from_value(result["tools"].clone())
                .context("Malformed tools/list response")?;

            println!("{}", "Available tools".cyan().bold());
            println!();
            let table = Table::new(tools).to_string();
            println!("{}", table);
        }

        Commands::Ping => match call_rpc(&cli.rpc_url, "ping", json!({})).await {
            Ok(_) => {
                println!("{} {}", "✓".green().bold(), cli.rpc_url);
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red().bold(), e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
