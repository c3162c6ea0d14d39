#![cfg(feature = "adapter-http")]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use vmsync_host::adapters::http::HttpAgentClient;
use vmsync_host::config::AgentClientConfig;
use vmsync_host::context::HostContext;
use vmsync_host::testing::RecordingSink;
use vmsync_host::{AgentClient, ReconciliationEngine, RemoteCallClient, RemoteCallError, SyncConfig};
use vmsync_store::{MemVmStore, VmRecord};
use vmsync_types::wire::VM_SYNC_PATH;
use vmsync_types::{HostId, HostInfo, VmId, VmState};

async fn start_test_server(
    body: &'static [u8],
    status_line: &'static str,
    delay: Option<Duration>,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let _ = stream.read(&mut buf).await;
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                status_line,
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.write_all(body).await;
        }
    });
    addr
}

async fn loopback_available() -> bool {
    TcpListener::bind("127.0.0.1:0").await.is_ok()
}

fn context_for(addr: SocketAddr) -> HostContext {
    HostContext {
        host: HostInfo::new("h1", "127.0.0.1"),
        base_url: format!("http://{addr}"),
    }
}

#[tokio::test]
async fn sync_call_decodes_report() {
    if !loopback_available().await {
        eprintln!("skipping sync_call_decodes_report: loopback bind not permitted");
        return;
    }

    let addr = start_test_server(
        br#"{"success":true,"states":{"vm-1":"running","vm-2":"shutoff"}}"#,
        "200 OK",
        None,
    )
    .await;
    let transport = HttpAgentClient::new(AgentClientConfig::default()).unwrap();
    let client = RemoteCallClient::new(Arc::new(transport));

    let report = client
        .call_sync(&context_for(addr), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.states.len(), 2);
    assert_eq!(report.states.get(&VmId::new("vm-1")), Some("running"));
}

#[tokio::test]
async fn slow_agent_times_out() {
    if !loopback_available().await {
        eprintln!("skipping slow_agent_times_out: loopback bind not permitted");
        return;
    }

    let addr = start_test_server(
        br#"{"success":true}"#,
        "200 OK",
        Some(Duration::from_millis(500)),
    )
    .await;
    let transport = HttpAgentClient::new(AgentClientConfig::default()).unwrap();

    let err = transport
        .call(
            &format!("http://{addr}"),
            VM_SYNC_PATH,
            serde_json::json!({}),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "{err}");
}

#[tokio::test]
async fn error_status_is_reported() {
    if !loopback_available().await {
        eprintln!("skipping error_status_is_reported: loopback bind not permitted");
        return;
    }

    let addr = start_test_server(b"boom", "500 Internal Server Error", None).await;
    let transport = HttpAgentClient::new(AgentClientConfig::default()).unwrap();

    let err = transport
        .call(
            &format!("http://{addr}"),
            VM_SYNC_PATH,
            serde_json::json!({}),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

    match err {
        RemoteCallError::Status { status, url } => {
            assert_eq!(status, 500);
            assert!(url.ends_with(VM_SYNC_PATH));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    if !loopback_available().await {
        eprintln!("skipping oversized_body_is_rejected: loopback bind not permitted");
        return;
    }

    let addr = start_test_server(br#"{"success":true}"#, "200 OK", None).await;
    let config = AgentClientConfig {
        max_body_size: 4,
        ..AgentClientConfig::default()
    };
    let transport = HttpAgentClient::new(config).unwrap();

    let err = transport
        .call(
            &format!("http://{addr}"),
            VM_SYNC_PATH,
            serde_json::json!({}),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteCallError::Decode { .. }), "{err}");
}

#[tokio::test]
async fn engine_syncs_over_http() {
    if !loopback_available().await {
        eprintln!("skipping engine_syncs_over_http: loopback bind not permitted");
        return;
    }

    let addr = start_test_server(
        br#"{"success":true,"states":{"vm-1":"blocked"}}"#,
        "200 OK",
        None,
    )
    .await;
    let mut config = SyncConfig::default();
    config.agent.port = addr.port();
    let store = Arc::new(MemVmStore::with_records([VmRecord::new(
        "vm-1",
        VmState::Stopped,
        Some(HostId::new("h1")),
    )]));
    let sink = Arc::new(RecordingSink::new());
    let transport = Arc::new(HttpAgentClient::new(config.agent.clone()).unwrap());
    let engine = ReconciliationEngine::builder(store, transport, sink.clone())
        .with_config(config)
        .build();

    engine
        .on_host_connected(&HostInfo::new("h1", "127.0.0.1"))
        .await
        .unwrap();

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].observed_state, VmState::Running);
    assert_eq!(messages[0].expected_state, VmState::Stopped);
}
