//! Coderelay - Main Entry Point
//! Hosts the codex tool behind a localhost JSON-RPC server

mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

// Import workspace crates
use coderelay_api_rpc::{RpcServer, RpcServerConfig};
use coderelay_core::application::invoker::{InvokerConfig, ProcessInvoker};
use coderelay_core::port::SystemClock;
use coderelay_infra_process::{FsOutputStore, TokioProcessRunner};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (JSON format for production)
    let log_format =
        std::env::var("CODERELAY_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("coderelay=info"))
        .expect("Failed to create env filter");

    // Every layer stacks onto one registry and the dispatcher is set
    // exactly once, so the OTLP layer shares the fmt layers' subscriber.
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![env_filter.boxed()];

    match log_format.as_str() {
        "json" => layers.push(fmt::layer().json().boxed()),
        _ => layers.push(fmt::layer().pretty().boxed()),
    }

    // Optional daily-rolling file output next to the console layer. The
    // guard flushes buffered lines on shutdown and must outlive main.
    let _appender_guard = match std::env::var("CODERELAY_LOG_DIR") {
        Ok(dir) => {
            let dir = shellexpand::tilde(&dir).into_owned();
            let appender = tracing_appender::rolling::daily(&dir, "coderelay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            match log_format.as_str() {
                "json" => layers.push(
                    fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_writer(writer)
                        .boxed(),
                ),
                _ => layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed()),
            }
            Some(guard)
        }
        Err(_) => None,
    };

    // Optional OTLP span export. A configured endpoint that cannot be
    // turned into an exporter fails startup instead of degrading silently.
    #[cfg(feature = "telemetry")]
    if let Some(otel) = telemetry::otel_layer()? {
        layers.push(otel.boxed());
    }

    tracing_subscriber::registry().with(layers).init();

    #[cfg(not(feature = "telemetry"))]
    telemetry::warn_if_endpoint_configured();

    info!("Coderelay v{} starting...", VERSION);

    // 2. Load configuration
    let rpc_port: u16 = std::env::var("CODERELAY_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9537);

    let codex_bin = std::env::var("CODERELAY_CODEX_BIN").unwrap_or_else(|_| "codex".to_string());
    let program = codex_bin.clone();

    // The credential is read once here and injected as configuration; the
    // invoker itself never touches the environment. A missing key is not
    // fatal at startup - tool calls are rejected with a clear error.
    let api_key = std::env::var("OPENAI_API_KEY").ok();
    let credential_present = api_key.is_some();
    if !credential_present {
        tracing::warn!("OPENAI_API_KEY not set; codex calls will be rejected");
    }

    // 3. Setup dependencies (DI wiring)
    let clock = Arc::new(SystemClock);
    let runner = Arc::new(TokioProcessRunner::new());
    let output_store = Arc::new(FsOutputStore::new());

    let invoker = Arc::new(ProcessInvoker::new(
        InvokerConfig {
            program: codex_bin,
            api_key,
            ..InvokerConfig::default()
        },
        clock,
        runner,
    ));

    // 4. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(rpc_config, invoker, output_store);
    let (rpc_handle, rpc_addr) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(
        version = VERSION,
        addr = %rpc_addr,
        program = %program,
        credential_present = credential_present,
        "✅ System ready. Waiting for tool calls..."
    );
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown
    let stopped = rpc_handle.clone();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), stopped.stopped()).await;

    info!("Shutdown complete.");

    Ok(())
}
