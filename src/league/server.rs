//! The HTTP transport shared by all three agents: one POST endpoint
//! accepting a JSON-RPC-shaped envelope and dispatching to an
//! [`MessageHandler`]. Adapted from the axum adapter used for the
//! MCP server elsewhere in this codebase (`mcp_http_adapter.rs`),
//! trimmed to the one route this protocol needs.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::league::envelope::{parse_envelope, Envelope, MessagePayload};
use crate::league::error::ProtocolError;

/// Implemented by each agent's state type: given a parsed inbound
/// envelope, produce the reply payload or a protocol-level rejection.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, envelope: Envelope) -> Result<MessagePayload, ProtocolError>;

    /// This agent's own `sender` string (e.g. `"referee:REF01"`), used
    /// to stamp reply envelopes.
    fn sender(&self) -> String;
}

pub fn router(handler: Arc<dyn MessageHandler>) -> Router {
    Router::new()
        .route("/mcp", post(handle_request))
        .with_state(handler)
}

pub async fn serve(addr: SocketAddr, handler: Arc<dyn MessageHandler>) -> std::io::Result<()> {
    let app = router(handler);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {}", addr);
    axum::serve(listener, app).await
}

/// The two failure channels this adapter can return, per the protocol
/// design: a malformed or rejected *message* still gets a `LEAGUE_ERROR`
/// wrapped in a normal `result` at HTTP 200 (the agent understood the
/// request and is answering within-protocol); a transport-level fault —
/// the envelope never even reached a handler — is a genuine JSON-RPC
/// `error` object at HTTP 500.
async fn handle_request(
    State(handler): State<Arc<dyn MessageHandler>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let id = body.get("id").cloned().unwrap_or(json!(null));

    let message = match body.get("params").and_then(|p| p.get("message")) {
        Some(m) => m.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32000, "message": "missing params.message" },
                })),
            )
        }
    };

    let outcome = match parse_envelope(message) {
        Ok(envelope) => handler.handle(envelope).await,
        Err(err) => Err(err),
    };

    let reply_payload = match outcome {
        Ok(payload) => payload,
        Err(err) => {
            log::warn!("rejecting message: {}", err);
            MessagePayload::error(&err)
        }
    };

    let reply = Envelope::new(handler.sender(), reply_payload);
    (StatusCode::OK, Json(json!({ "jsonrpc": "2.0", "id": id, "result": reply })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::league::envelope::PROTOCOL_VERSION;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct EchoHandler;

    #[async_trait]
    impl MessageHandler for EchoHandler {
        async fn handle(&self, _envelope: Envelope) -> Result<MessagePayload, ProtocolError> {
            Ok(MessagePayload::Ack { received: true })
        }

        fn sender(&self) -> String {
            "league_manager:LM".to_string()
        }
    }

    #[tokio::test]
    async fn dispatches_a_valid_envelope_and_wraps_the_reply() {
        let app = router(Arc::new(EchoHandler));

        let message = json!({
            "protocol": PROTOCOL_VERSION,
            "message_type": "START_LEAGUE",
            "sender": "league_manager:LM",
            "timestamp": "2026-01-01T00:00:00Z",
            "conversation_id": "c1",
            "league_id": "L1",
        });
        let body = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "handle_message",
            "params": { "message": message },
        });

        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_params_message_returns_jsonrpc_error_at_500() {
        let app = router(Arc::new(EchoHandler));
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": "handle_message", "params": {} });
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn a_protocol_level_rejection_still_returns_200_with_league_error_in_result() {
        let app = router(Arc::new(EchoHandler));
        let message = json!({
            "protocol": "league.v1",
            "message_type": "START_LEAGUE",
            "sender": "league_manager:LM",
            "timestamp": "2026-01-01T00:00:00Z",
            "conversation_id": "c1",
            "league_id": "L1",
        });
        let body = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "handle_message",
            "params": { "message": message },
        });
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["result"]["message_type"], "LEAGUE_ERROR");
    }
}
