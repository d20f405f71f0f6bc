//! Progress events streamed to clients while a run is in flight.
//!
//! Each variant maps to one named server-sent event (see [`ProgressEvent::name`]); the
//! variant's fields are the JSON payload. Consumers should treat the stream as progress
//! only; the [`Complete`](ProgressEvent::Complete) payload is authoritative for final state.
//!
//! # Event flow for one iteration
//!
//! ```text
//! iteration_start
//!   stage_start(recruitment)   llm_request   stage_complete(recruitment)
//!   stage_start(decision)
//!     llm_request*  discussion_round | vertical_iteration   (per round)
//!     llm_request                                           (decision synthesis)
//!   stage_complete(decision)
//!   stage_start(execution)     (llm_request  execution_result)*  stage_complete(execution)
//!   stage_start(evaluation)    llm_request   stage_complete(evaluation)
//! iteration_complete
//! ...
//! stage_start(synthesis)  llm_request  stage_complete(synthesis)
//! complete | error
//! ```

use crate::agentverse::ledger::LedgerEntry;
use crate::agentverse::model::{ExpertResponse, Iteration, ReviewerCritique, RunReport, Stage};
use crate::agentverse::roles::ExpertRole;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    IterationStart {
        iteration: usize,
        max_iterations: usize,
        message: String,
    },
    StageStart {
        iteration: usize,
        stage: Stage,
        stage_number: u8,
        message: String,
    },
    /// `detail` is the stage outcome as JSON.
    StageComplete {
        iteration: usize,
        stage: Stage,
        stage_number: u8,
        message: String,
        detail: serde_json::Value,
    },
    /// A ledger entry, published as soon as it has its sequence number.
    LlmRequest(LedgerEntry),
    DiscussionRound {
        iteration: usize,
        round: usize,
        responses: Vec<ExpertResponse>,
        consensus: bool,
    },
    VerticalIteration {
        iteration: usize,
        round: usize,
        /// First 200 characters of the solver's proposal.
        proposal_preview: String,
        critiques: Vec<ReviewerCritique>,
        all_approved: bool,
    },
    ExecutionResult {
        iteration: usize,
        expert_index: usize,
        role: ExpertRole,
        success: bool,
        output_preview: String,
        completed: usize,
        total: usize,
    },
    IterationComplete {
        iteration: usize,
        iteration_history: Vec<Iteration>,
    },
    Error {
        stage: Stage,
        message: String,
        report: Box<RunReport>,
    },
    Complete(Box<RunReport>),
}

impl ProgressEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::IterationStart { .. } => "iteration_start",
            ProgressEvent::StageStart { .. } => "stage_start",
            ProgressEvent::StageComplete { .. } => "stage_complete",
            ProgressEvent::LlmRequest(_) => "llm_request",
            ProgressEvent::DiscussionRound { .. } => "discussion_round",
            ProgressEvent::VerticalIteration { .. } => "vertical_iteration",
            ProgressEvent::ExecutionResult { .. } => "execution_result",
            ProgressEvent::IterationComplete { .. } => "iteration_complete",
            ProgressEvent::Error { .. } => "error",
            ProgressEvent::Complete(_) => "complete",
        }
    }

    /// Terminal events are never dropped by the progress queue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Error { .. } | ProgressEvent::Complete(_))
    }
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
