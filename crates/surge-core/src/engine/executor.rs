use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use crate::http::transport::{Transport, TransportRequest, TransportResponse};
use crate::results::{Outcome, RequestResult};

/// Issues the configured request once per index and records the outcome.
///
/// Failures never escape: transport errors and error statuses both end up as
/// data on the returned [`RequestResult`].
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    request: TransportRequest,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, request: TransportRequest) -> Self {
        Self { transport, request }
    }

    pub async fn make_request(&self, index: u64) -> RequestResult {
        let issued_at = Utc::now();
        let start = Instant::now();
        let sent = self.transport.send(&self.request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match sent {
            Ok(response) => RequestResult {
                index,
                outcome: Outcome::Response {
                    status: response.status,
                },
                elapsed_ms,
                size_bytes: response_size(&response),
                issued_at,
            },
            Err(err) => {
                tracing::debug!(index, reason = %err.reason(), "request failed: {}", err.message);
                RequestResult {
                    index,
                    outcome: Outcome::TransportFailure {
                        error: err.reason(),
                    },
                    elapsed_ms,
                    size_bytes: 0,
                    issued_at,
                }
            }
        }
    }
}

/// Serialized header length plus body length; 0 if the headers cannot be
/// serialized.
fn response_size(response: &TransportResponse) -> u64 {
    match serde_json::to_vec(&response.headers) {
        Ok(headers) => (headers.len() + response.body.len()) as u64,
        Err(_) => 0,
    }
}
