use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tracing::warn;
use vmsync_types::wire::{REPORT_VM_STATE_PATH, ReportVmStateRequest};

use crate::error::SyncError;
use crate::http::PushState;

pub fn router(state: PushState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(REPORT_VM_STATE_PATH, post(report_vm_state))
        .with_state(state)
}

#[derive(Debug)]
struct ApiError(SyncError);

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            SyncError::UnrecognizedState(_) => (StatusCode::BAD_REQUEST, "unrecognized_state"),
            SyncError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            SyncError::Sink(_) | SyncError::Emit { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "sink_closed")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = serde_json::json!({ "code": code, "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn report_vm_state(
    State(state): State<PushState>,
    Json(report): Json<ReportVmStateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .handler
        .handle_push(&report.vm_uuid, &report.host_uuid, &report.vm_state)
        .map_err(|err| {
            warn!(
                vm_id = %report.vm_uuid,
                host_id = %report.host_uuid,
                "rejected vm state report: {err}"
            );
            ApiError::from(err)
        })?;
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use vmsync_store::{DynVmStore, MemVmStore, VmRecord};
    use vmsync_types::{HostId, VmId, VmState};

    use crate::push::PushHandler;
    use crate::testing::RecordingSink;

    fn app() -> (Router, Arc<RecordingSink>) {
        let store: DynVmStore = Arc::new(MemVmStore::with_records([VmRecord::new(
            "vm-1",
            VmState::Running,
            Some(HostId::new("h1")),
        )]));
        let sink = Arc::new(RecordingSink::new());
        let handler = PushHandler::new(store, sink.clone());
        (router(PushState { handler }), sink)
    }

    fn push(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(REPORT_VM_STATE_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn accepted_push_reaches_sink() {
        let (app, sink) = app();
        let resp = app
            .oneshot(push(r#"{"hostUuid":"h1","vmUuid":"vm-1","vmState":"Paused"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].vm_id, VmId::new("vm-1"));
        assert_eq!(messages[0].observed_state, VmState::Paused);
        assert_eq!(messages[0].expected_state, VmState::Running);
    }

    #[tokio::test]
    async fn orphan_push_is_acknowledged_and_dropped() {
        let (app, sink) = app();
        let resp = app
            .oneshot(push(r#"{"hostUuid":"h1","vmUuid":"ghost","vmState":"Running"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn bad_token_is_a_client_error() {
        let (app, sink) = app();
        let resp = app
            .oneshot(push(r#"{"hostUuid":"h1","vmUuid":"vm-1","vmState":"Melting"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "unrecognized_state");
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn health_answers() {
        let (app, _) = app();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
