//! Data produced during a run.
//!
//! Everything here is plain serialisable data. The [`Orchestrator`](crate::orchestrator::Orchestrator)
//! is the only writer; stages hand back finished values and never mutate an
//! [`Iteration`] after its evaluation has been recorded.

use crate::agentverse::ledger::LedgerEntry;
use crate::agentverse::roles::ExpertRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard cap on iterations per run.
pub const MAX_ITERATIONS_CAP: usize = 5;

/// The input of a run. Immutable once built.
#[derive(Clone, Debug, Serialize)]
pub struct Task {
    pub description: String,
    pub max_iterations: usize,
    /// Score (0..=100) at or above which the goal counts as achieved.
    pub score_threshold: Option<u8>,
    /// Free-form label forwarded to workers for their telemetry.
    pub scenario: Option<String>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            max_iterations: 3,
            score_threshold: None,
            scenario: None,
        }
    }

    /// Clamped to `1..=MAX_ITERATIONS_CAP`.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1).min(MAX_ITERATIONS_CAP);
        self
    }

    pub fn with_score_threshold(mut self, threshold: u8) -> Self {
        self.score_threshold = Some(threshold.min(100));
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }
}

/// Workflow stage, used to tag ledger entries, progress events and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Recruitment,
    Decision,
    Execution,
    Evaluation,
    Synthesis,
}

impl Stage {
    /// 1-based position in the workflow, shown to progress consumers.
    pub fn number(self) -> u8 {
        match self {
            Stage::Recruitment => 1,
            Stage::Decision => 2,
            Stage::Execution => 3,
            Stage::Evaluation => 4,
            Stage::Synthesis => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Recruitment => "recruitment",
            Stage::Decision => "decision",
            Stage::Execution => "execution",
            Stage::Evaluation => "evaluation",
            Stage::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationStructure {
    /// Democratic rounds; every expert speaks each round.
    Horizontal,
    /// First expert proposes, the rest review.
    Vertical,
}

impl CommunicationStructure {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Some(CommunicationStructure::Horizontal),
            "vertical" => Some(CommunicationStructure::Vertical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommunicationStructure::Horizontal => "horizontal",
            CommunicationStructure::Vertical => "vertical",
        }
    }
}

/// A recruited participant, valid for one iteration.
#[derive(Clone, Debug, Serialize)]
pub struct Expert {
    pub index: usize,
    pub role: ExpertRole,
    pub responsibilities: String,
    pub contract: String,
    pub endpoint: String,
}

impl Expert {
    /// Ledger source name, 1-based like the worker numbering operators see.
    pub fn source(&self) -> String {
        format!("expert-{}", self.index + 1)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RecruitmentOutcome {
    pub experts: Vec<Expert>,
    pub structure: CommunicationStructure,
    pub execution_order: Vec<String>,
    pub reasoning: String,
}

/// One expert's contribution to a horizontal round.
#[derive(Clone, Debug, Serialize)]
pub struct ExpertResponse {
    pub expert_index: usize,
    pub role: ExpertRole,
    pub response: String,
    pub consensus: bool,
    /// `false` when the worker call failed and `response` holds the error text.
    pub participated: bool,
}

/// One reviewer's verdict in a vertical iteration.
#[derive(Clone, Debug, Serialize)]
pub struct ReviewerCritique {
    pub reviewer_index: usize,
    pub role: ExpertRole,
    pub critique: String,
    pub approved: bool,
    pub participated: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DiscussionRound {
    Horizontal {
        round: usize,
        responses: Vec<ExpertResponse>,
        consensus: bool,
    },
    Vertical {
        round: usize,
        solver_index: usize,
        proposal: String,
        critiques: Vec<ReviewerCritique>,
        all_approved: bool,
    },
}

impl DiscussionRound {
    /// Whether this round ended the negotiation early.
    pub fn settled(&self) -> bool {
        match self {
            DiscussionRound::Horizontal { consensus, .. } => *consensus,
            DiscussionRound::Vertical { all_approved, .. } => *all_approved,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DecisionOutcome {
    pub structure: CommunicationStructure,
    pub rounds: Vec<DiscussionRound>,
    pub final_decision: String,
    pub consensus_reached: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExecutionOutput {
    pub expert_index: usize,
    pub role: ExpertRole,
    pub subtask: String,
    pub success: bool,
    /// The worker's result, or the failure text when `success` is false.
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExecutionOutcome {
    pub outputs: Vec<ExecutionOutput>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ExecutionOutcome {
    /// Sorts by expert index and derives the counts from the outputs themselves.
    pub fn from_outputs(mut outputs: Vec<ExecutionOutput>) -> Self {
        outputs.sort_by_key(|o| o.expert_index);
        let success_count = outputs.iter().filter(|o| o.success).count();
        let failure_count = outputs.len() - success_count;
        Self {
            outputs,
            success_count,
            failure_count,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CriteriaScores {
    pub completeness: Option<u8>,
    pub correctness: Option<u8>,
    pub clarity: Option<u8>,
    pub relevance: Option<u8>,
    pub actionability: Option<u8>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EvaluationResult {
    pub score: u8,
    pub goal_achieved: bool,
    pub criteria: CriteriaScores,
    pub rationale: String,
    pub feedback: String,
    pub missing_aspects: Vec<String>,
    pub should_iterate: bool,
}

/// One pass through the four stages. Later stages stay `None` when the run was
/// cancelled or failed part-way through.
#[derive(Clone, Debug, Serialize)]
pub struct Iteration {
    pub number: usize,
    pub recruitment: Option<RecruitmentOutcome>,
    pub decision: Option<DecisionOutcome>,
    pub execution: Option<ExecutionOutcome>,
    pub evaluation: Option<EvaluationResult>,
    pub duration_seconds: f64,
}

impl Iteration {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            recruitment: None,
            decision: None,
            execution: None,
            evaluation: None,
            duration_seconds: 0.0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.evaluation.is_some()
    }
}

/// Controller state. `Done`, `Error` and `Cancelled` are absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Recruiting,
    Deciding,
    Executing,
    Evaluating,
    Synthesizing,
    Done,
    Error,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Error | RunPhase::Cancelled)
    }

    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        if self.is_terminal() {
            return false;
        }
        match next {
            Error | Cancelled => true,
            _ => matches!(
                (self, next),
                (Recruiting, Deciding)
                    | (Deciding, Executing)
                    | (Executing, Evaluating)
                    | (Evaluating, Recruiting)
                    | (Evaluating, Synthesizing)
                    | (Synthesizing, Done)
            ),
        }
    }
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Finished; counts refer to the final iteration's execution stage.
    Completed {
        experts_succeeded: usize,
        experts_attempted: usize,
    },
    Cancelled,
    Error { stage: Stage, message: String },
}

impl RunOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RunOutcome::Completed { .. } => "completed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Error { .. } => "error",
        }
    }
}

/// Summaries of the final iteration's stages.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StageSummaries {
    pub recruitment: Option<RecruitmentOutcome>,
    pub decision: Option<DecisionOutcome>,
    pub execution: Option<ExecutionOutcome>,
    pub evaluation: Option<EvaluationResult>,
}

/// The document returned to callers, and carried by the `complete` event.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub task: String,
    pub outcome: RunOutcome,
    pub iterations_completed: usize,
    pub duration_seconds: f64,
    pub final_output: Option<String>,
    pub stages: StageSummaries,
    pub iteration_history: Vec<Iteration>,
    pub llm_requests: Vec<LedgerEntry>,
    pub phase_trace: Vec<RunPhase>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_iterations_are_clamped() {
        assert_eq!(Task::new("x").with_max_iterations(0).max_iterations, 1);
        assert_eq!(Task::new("x").with_max_iterations(9).max_iterations, MAX_ITERATIONS_CAP);
        assert_eq!(Task::new("x").with_score_threshold(140).score_threshold, Some(100));
    }

    #[test]
    fn phase_transitions_follow_the_stage_order() {
        use RunPhase::*;
        assert!(Recruiting.can_transition_to(Deciding));
        assert!(Evaluating.can_transition_to(Recruiting));
        assert!(Evaluating.can_transition_to(Synthesizing));
        assert!(Executing.can_transition_to(Cancelled));
        assert!(!Recruiting.can_transition_to(Executing));
        assert!(!Deciding.can_transition_to(Synthesizing));
        assert!(!Done.can_transition_to(Error));
        assert!(!Cancelled.can_transition_to(Recruiting));
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let value = serde_json::to_value(RunOutcome::Error {
            stage: Stage::Recruitment,
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["stage"], "recruitment");
    }

    #[test]
    fn execution_counts_come_from_outputs() {
        let output = |idx, success| ExecutionOutput {
            expert_index: idx,
            role: ExpertRole::Executor,
            subtask: String::new(),
            success,
            output: String::new(),
            started_at: Utc::now(),
            duration_seconds: 0.0,
        };
        let outcome = ExecutionOutcome::from_outputs(vec![output(2, true), output(0, false), output(1, true)]);
        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.failure_count, 1);
        let order: Vec<usize> = outcome.outputs.iter().map(|o| o.expert_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
