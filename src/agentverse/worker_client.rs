//! The orchestrator's view of the expert worker processes.
//!
//! Workers are remote services with a fixed request/response contract. The same client
//! serves every endpoint in the pool; the caller picks the endpoint bound to the expert.

use crate::agentverse::error::WorkerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payload sent to a worker. Field names follow the worker wire contract.
#[derive(Clone, Debug, Serialize)]
pub struct WorkerRequest {
    pub subtask: String,
    /// Telemetry label only; workers may tag their own traces with it.
    pub scenario: String,
    #[serde(rename = "agent_b_role", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "agent_b_contract", skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(skip)]
    pub request_id: String,
}

/// A worker's answer. Workers that call a model themselves may report the exact
/// prompt/response they used, which the ledger prefers over our own subtask text.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorkerReply {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub llm_prompt: Option<String>,
    #[serde(default)]
    pub llm_response: Option<String>,
    #[serde(default)]
    pub llm_endpoint: Option<String>,
}

impl WorkerReply {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Send one subtask to `endpoint` and wait for its result.
    async fn dispatch(&self, endpoint: &str, request: &WorkerRequest) -> Result<WorkerReply, WorkerError>;
}
