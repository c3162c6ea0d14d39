pub mod api;

use std::net::SocketAddr;

use axum::Router;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::PushServerConfig;
use crate::push::PushHandler;

#[derive(Clone)]
pub struct PushState {
    pub handler: PushHandler,
}

/// Start the push endpoint unless disabled. Stops on the shutdown broadcast.
pub fn spawn_push_server(
    config: PushServerConfig,
    handler: PushHandler,
    shutdown_tx: broadcast::Sender<()>,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        return None;
    }
    let app = api::router(PushState { handler });

    Some(tokio::spawn(async move {
        let addr = config.bind;
        if let Err(err) = serve(addr, app, shutdown_tx).await {
            tracing::error!("push server error: {err}");
        }
    }))
}

async fn serve(
    addr: SocketAddr,
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind {addr}: {e}"))?;
    tracing::info!("push endpoint listening on http://{}", addr);
    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| format!("serve {addr}: {e}"))
}
