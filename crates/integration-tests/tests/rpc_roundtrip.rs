//! Full-stack round trip: SDK client -> JSON-RPC server -> ProcessInvoker
//! -> fake codex script on disk
//!
//! Each test boots its own server on an ephemeral port.

#![cfg(unix)]

use coderelay_api_rpc::{RpcServer, RpcServerConfig};
use coderelay_core::application::invoker::{InvokerConfig, ProcessInvoker};
use coderelay_core::port::SystemClock;
use coderelay_infra_process::{FsOutputStore, TokioProcessRunner};
use coderelay_sdk::{CoderelayClient, CodexRequest};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::HttpClientBuilder;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use tempfile::TempDir;

struct TestServer {
    url: String,
    _handle: jsonrpsee::server::ServerHandle,
    _dir: TempDir,
}

/// Boot a server whose codex binary is a script echoing stdin back
async fn start_server() -> TestServer {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("fake-codex");
    std::fs::write(&script, "#!/bin/sh\ncat\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let invoker = Arc::new(ProcessInvoker::new(
        InvokerConfig {
            program: script.to_string_lossy().into_owned(),
            api_key: Some("sk-roundtrip".to_string()),
            ..InvokerConfig::default()
        },
        Arc::new(SystemClock),
        Arc::new(TokioProcessRunner::new()),
    ));

    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (handle, addr) = RpcServer::new(config, invoker, Arc::new(FsOutputStore::new()))
        .start()
        .await
        .unwrap();

    TestServer {
        url: format!("http://{}", addr),
        _handle: handle,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let server = start_server().await;
    let client = CoderelayClient::connect(&server.url).await.unwrap();

    let init = client.initialize().await.unwrap();
    assert_eq!(init.protocol_version, "2024-11-05");
    assert_eq!(init.server_info.name, "coderelay");

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "codex");

    client.ping().await.unwrap();
    println!("✅ initialize, tools/list and ping answered");
}

#[tokio::test]
async fn test_call_codex_echoes_prompt() {
    let server = start_server().await;
    let client = CoderelayClient::connect(&server.url).await.unwrap();

    let result = client
        .call_codex(CodexRequest::new("round trip me").with_reasoning_effort("low"))
        .await
        .unwrap();

    assert!(!result.is_error());
    assert_eq!(result.text(), Some("round trip me"));
    println!("✅ tools/call round trip through the real stack");
}

#[tokio::test]
async fn test_output_file_persisted_with_nested_dirs() {
    let server = start_server().await;
    let client = CoderelayClient::connect(&server.url).await.unwrap();

    let out_dir = TempDir::new().unwrap();
    let out_path = out_dir.path().join("deep/nested/review.txt");

    let result = client
        .call_codex(
            CodexRequest::new("persist this")
                .with_output_file(out_path.to_string_lossy().into_owned()),
        )
        .await
        .unwrap();

    assert!(!result.is_error());
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "persist this");
    println!("✅ output_file written, parent directories created");
}

#[tokio::test]
async fn test_unknown_tool_is_not_found() {
    let server = start_server().await;
    let client = HttpClientBuilder::default().build(&server.url).unwrap();

    let mut params = ObjectParams::new();
    params.insert("name", "shell").unwrap();
    params.insert("arguments", serde_json::json!({})).unwrap();

    let err = client
        .request::<serde_json::Value, _>("tools/call", params)
        .await
        .unwrap_err();

    match err {
        jsonrpsee::core::ClientError::Call(e) => assert_eq!(e.code(), 4001),
        other => panic!("expected call error, got {:?}", other),
    }
    println!("✅ unknown tool rejected with NOT_FOUND");
}

#[tokio::test]
async fn test_missing_prompt_is_validation_error() {
    let server = start_server().await;
    let client = HttpClientBuilder::default().build(&server.url).unwrap();

    let mut params = ObjectParams::new();
    params.insert("name", "codex").unwrap();
    params
        .insert("arguments", serde_json::json!({ "model": "o3" }))
        .unwrap();

    let err = client
        .request::<serde_json::Value, _>("tools/call", params)
        .await
        .unwrap_err();

    match err {
        jsonrpsee::core::ClientError::Call(e) => assert_eq!(e.code(), 4000),
        other => panic!("expected call error, got {:?}", other),
    }
    println!("✅ missing prompt rejected with VALIDATION_ERROR");
}

#[tokio::test]
async fn test_failed_invocation_returns_in_band_error() {
    // A server whose codex always fails
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("failing-codex");
    std::fs::write(&script, "#!/bin/sh\necho 'quota exceeded' >&2\nexit 7\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let invoker = Arc::new(ProcessInvoker::new(
        InvokerConfig {
            program: script.to_string_lossy().into_owned(),
            api_key: Some("sk-roundtrip".to_string()),
            ..InvokerConfig::default()
        },
        Arc::new(SystemClock),
        Arc::new(TokioProcessRunner::new()),
    ));
    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (_handle, addr) = RpcServer::new(config, invoker, Arc::new(FsOutputStore::new()))
        .start()
        .await
        .unwrap();

    let client = CoderelayClient::connect(format!("http://{}", addr))
        .await
        .unwrap();

    let result = client.call_codex(CodexRequest::new("p")).await.unwrap();
    assert!(result.is_error());
    let text = result.text().unwrap();
    assert!(text.contains('7'));
    assert!(text.contains("quota exceeded"));
    println!("✅ invocation failure relayed in-band with isError");
}
