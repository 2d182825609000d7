//! JSON-RPC Server
//!
//! Exposes the MCP-shaped methods over JSON-RPC 2.0.

use crate::handler::RpcHandler;
use crate::types::CallToolRequest;
use coderelay_core::application::invoker::ProcessInvoker;
use coderelay_core::port::OutputStore;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

// Note: jsonrpsee doesn't support Unix sockets directly (hyper limitation)
// Using TCP on localhost as secure alternative (no external access)
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9537;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        invoker: Arc<ProcessInvoker>,
        output_store: Arc<dyn OutputStore>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(invoker, output_store)),
        }
    }

    /// Start the JSON-RPC server, returning the handle and the bound
    /// address (port 0 in the config requests an ephemeral port)
    ///
    /// Security: only binds to 127.0.0.1 by default (no external access)
    pub async fn start(self) -> Result<(ServerHandle, SocketAddr), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let local_addr = server.local_addr().map_err(|e| e.to_string())?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("initialize", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.initialize().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("tools/list", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.list_tools().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("tools/call", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CallToolRequest = params.parse()?;
                    handler.call_tool(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("ping", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.ping().await }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((handle, local_addr))
    }
}
