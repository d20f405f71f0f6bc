//! Error types shared across the orchestrator.
//!
//! Transport-level failures ([`LlmError`], [`WorkerError`]) are produced by the
//! client implementations. Stages decide whether a given failure is tolerated
//! (recorded as a non-participating response or a failed execution output) or
//! escalated into a [`StageError`], which ends the run.

use crate::agentverse::model::Stage;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single exchange with the language-model backend.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),
    #[error("LLM transport error: {0}")]
    Transport(String),
    #[error("LLM backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode LLM reply: {0}")]
    Decode(String),
}

/// Failure of a single subtask dispatch to a worker endpoint.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("worker call to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },
    #[error("worker transport error at {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    #[error("worker {endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("could not decode reply from worker {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

/// A failure that aborts the run at a named stage.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("{stage} exchange failed: {source}")]
    Llm {
        stage: Stage,
        #[source]
        source: LlmError,
    },
    #[error("{stage} reply could not be parsed: {reason}")]
    Unparsable { stage: Stage, reason: String },
    #[error("solver call failed: {0}")]
    Solver(#[source] WorkerError),
}

impl StageError {
    /// The stage the run failed in.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Llm { stage, .. } | StageError::Unparsable { stage, .. } => *stage,
            StageError::Solver(_) => Stage::Decision,
        }
    }
}

/// Why [`Orchestrator::run_with`](crate::orchestrator::Orchestrator::run_with) stopped early.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Fatal(#[from] StageError),
    #[error("run cancelled")]
    Cancelled,
}

/// Invalid value in the environment or on the command line.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("{name} must be a {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("at least one worker endpoint is required")]
    NoWorkers,
}
