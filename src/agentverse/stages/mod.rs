//! The four workflow stages plus the final synthesis exchange.
//!
//! Stages are free functions over a borrowed [`StageContext`]. They return finished
//! outcomes and leave state transitions, stage events and cancellation to the
//! [`Orchestrator`](crate::orchestrator::Orchestrator).

pub mod decision;
pub mod evaluation;
pub mod execution;
pub mod recruitment;
pub mod synthesis;

use crate::agentverse::clients::new_request_id;
use crate::agentverse::config::OrchestratorConfig;
use crate::agentverse::error::{LlmError, WorkerError};
use crate::agentverse::ledger::Exchange;
use crate::agentverse::llm_client::{LlmClient, LlmRequest};
use crate::agentverse::model::{Expert, Stage, Task};
use crate::agentverse::prompts;
use crate::agentverse::recorder::RecorderHandle;
use crate::agentverse::roles::WorkerPool;
use crate::agentverse::vote::VoteExtractor;
use crate::agentverse::worker_client::{WorkerClient, WorkerReply, WorkerRequest};
use chrono::Utc;
use std::time::Instant;
use tokio::time::timeout;

/// Everything a stage needs for one iteration of one run.
pub struct StageContext<'a> {
    pub task: &'a Task,
    /// 1-based iteration number.
    pub iteration: usize,
    pub config: &'a OrchestratorConfig,
    pub llm: &'a dyn LlmClient,
    pub workers: &'a dyn WorkerClient,
    pub pool: &'a WorkerPool,
    pub votes: &'a dyn VoteExtractor,
    pub recorder: &'a RecorderHandle,
}

impl<'a> StageContext<'a> {
    pub fn scenario(&self) -> &str {
        self.task.scenario.as_deref().unwrap_or(&self.config.scenario)
    }

    /// One orchestrator exchange with the model, recorded in the ledger on success.
    pub(crate) async fn ask_llm(
        &self,
        stage: Stage,
        label: &str,
        prompt: String,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        let mut request = LlmRequest::new(prompt, new_request_id()).with_system_prompt(prompts::ORCHESTRATOR_SYSTEM);
        if let Some(limit) = max_tokens {
            request = request.with_max_tokens(limit);
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let reply = match timeout(self.config.llm_timeout, self.llm.complete(&request)).await {
            Ok(result) => result?,
            Err(_) => return Err(LlmError::Timeout(self.config.llm_timeout)),
        };

        self.recorder.record(Exchange {
            iteration: self.iteration,
            stage,
            label: label.to_string(),
            source: "orchestrator".to_string(),
            role: Some("orchestrator".to_string()),
            prompt: request.prompt,
            response: reply.text.clone(),
            endpoint: self.llm.endpoint().to_string(),
            started_at,
            duration_seconds: clock.elapsed().as_secs_f64(),
            request_id: request.request_id,
            round: None,
            usage: reply.reported_usage(),
        });
        Ok(reply.text)
    }

    /// One subtask sent to the expert's worker, bounded by the worker timeout.
    ///
    /// The ledger prefers the prompt/response the worker reports having used itself.
    pub(crate) async fn ask_worker(
        &self,
        stage: Stage,
        label: String,
        expert: &Expert,
        subtask: String,
        round: Option<usize>,
    ) -> Result<WorkerReply, WorkerError> {
        let request = WorkerRequest {
            subtask,
            scenario: self.scenario().to_string(),
            role: Some(expert.role.to_string()),
            contract: Some(expert.contract.clone()),
            request_id: new_request_id(),
        };

        let started_at = Utc::now();
        let clock = Instant::now();
        let limit = self.config.worker_timeout;
        let reply = match timeout(limit, self.workers.dispatch(&expert.endpoint, &request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(WorkerError::Timeout {
                    endpoint: expert.endpoint.clone(),
                    timeout: limit,
                })
            }
        };

        self.recorder.record(Exchange {
            iteration: self.iteration,
            stage,
            label,
            source: expert.source(),
            role: Some(expert.role.to_string()),
            prompt: reply.llm_prompt.clone().unwrap_or(request.subtask),
            response: reply.llm_response.clone().unwrap_or_else(|| reply.output.clone()),
            endpoint: reply.llm_endpoint.clone().unwrap_or_else(|| expert.endpoint.clone()),
            started_at,
            duration_seconds: clock.elapsed().as_secs_f64(),
            request_id: request.request_id,
            round,
            usage: None,
        });
        Ok(reply)
    }
}
