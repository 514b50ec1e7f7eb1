//! Outbound remote calls: wraps a message in the JSON-RPC envelope the
//! transport uses, posts it, and retries transient failures with
//! exponential backoff. Mirrors the cached-client-wrapper shape of
//! `McpClientProtocol` (`tool_protocols.rs`), minus the tool-listing
//! cache this protocol has no use for.

use std::time::Duration;

use serde_json::{json, Value};

use crate::league::envelope::Envelope;
use crate::league::error::TransportError;

const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(10);
const BACKOFF_FACTOR: u32 = 2;
const MAX_RETRIES: u32 = 3;

/// A client bound to one remote agent endpoint.
#[derive(Debug, Clone)]
pub struct RemoteAgentClient {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteAgentClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    /// Send `envelope` to the peer's single JSON-RPC endpoint, retrying
    /// transient transport failures with exponential backoff. A
    /// well-formed JSON-RPC response (success or `LEAGUE_ERROR` result)
    /// is returned as-is without being retried; only connection/timeout
    /// failures before a response is received are retried.
    pub async fn send(&self, envelope: &Envelope) -> Result<Value, TransportError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "handle_message",
            "params": { "message": envelope },
        });

        let mut delay = INITIAL_DELAY;
        let mut last_error = String::new();

        for attempt in 1..=MAX_RETRIES {
            match self.try_send(&body).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    last_error = err.to_string();
                    log::warn!(
                        "transport call to {} failed (attempt {}/{}): {}",
                        self.endpoint,
                        attempt,
                        MAX_RETRIES,
                        last_error
                    );
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(delay).await;
                        delay = (delay * BACKOFF_FACTOR).min(MAX_DELAY);
                    }
                }
            }
        }

        Err(TransportError::RetriesExhausted {
            attempts: MAX_RETRIES,
            last_error,
        })
    }

    async fn try_send(&self, body: &Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::ConnectionFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(TransportError::ConnectionFailed(format!(
                "peer returned status {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }
}
