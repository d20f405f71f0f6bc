use crate::agentverse::clients::http_pool::get_http_client;
use crate::agentverse::error::WorkerError;
use crate::agentverse::worker_client::{WorkerClient, WorkerReply, WorkerRequest};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

/// [`WorkerClient`] that POSTs the subtask JSON to the expert's endpoint.
pub struct HttpWorkerClient {
    timeout: Duration,
}

impl HttpWorkerClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn dispatch(&self, endpoint: &str, request: &WorkerRequest) -> Result<WorkerReply, WorkerError> {
        let http = get_http_client(endpoint);
        debug!(
            "agentverse::clients::http_worker: req={} POST {} role={:?}",
            request.request_id, endpoint, request.role
        );

        let transport_error = |e: reqwest::Error| {
            if e.is_timeout() {
                WorkerError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout: self.timeout,
                }
            } else {
                WorkerError::Transport {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let response = http
            .post(endpoint)
            .header("X-Request-ID", &request.request_id)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response.json::<WorkerReply>().await.map_err(|e| WorkerError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}
