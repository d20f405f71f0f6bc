//! The iteration controller.
//!
//! An [`Orchestrator`] owns the clients and configuration shared by every run. Each call
//! to [`Orchestrator::run`] drives one task through the state machine
//!
//! ```text
//! Recruiting -> Deciding -> Executing -> Evaluating -+-> Recruiting   (should_iterate, under the cap)
//!                                                    +-> Synthesizing -> Done
//! any non-terminal phase -> Error | Cancelled
//! ```
//!
//! Iterations form an explicit loop. The only value carried from one iteration to the
//! next is the evaluation feedback string.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentverse::{Orchestrator, OrchestratorConfig, Task};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! agentverse::init_logger();
//! let orchestrator = Orchestrator::from_config(OrchestratorConfig::from_env()?)?;
//! let report = orchestrator
//!     .run(Task::new("Summarize the history of the printing press").with_max_iterations(2))
//!     .await;
//! println!("{}: {:?}", report.outcome.status(), report.final_output);
//! # Ok(())
//! # }
//! ```

use crate::agentverse::clients::http_llm::HttpLlmClient;
use crate::agentverse::clients::http_worker::HttpWorkerClient;
use crate::agentverse::config::{OrchestratorConfig, MAX_DISCUSSION_ROUNDS_CAP};
use crate::agentverse::error::{ConfigError, OrchestratorError};
use crate::agentverse::event::ProgressEvent;
use crate::agentverse::llm_client::LlmClient;
use crate::agentverse::model::{
    EvaluationResult, Iteration, RunOutcome, RunPhase, RunReport, Stage, StageSummaries, Task,
};
use crate::agentverse::recorder::{RecorderHandle, RunRecorder};
use crate::agentverse::roles::WorkerPool;
use crate::agentverse::stages::{decision, evaluation, execution, recruitment, synthesis, StageContext};
use crate::agentverse::vote::{TokenVoteExtractor, VoteExtractor};
use crate::agentverse::worker_client::WorkerClient;
use log::{error, info, warn};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct Orchestrator {
    config: OrchestratorConfig,
    pool: WorkerPool,
    llm: Arc<dyn LlmClient>,
    workers: Arc<dyn WorkerClient>,
    votes: Arc<dyn VoteExtractor>,
}

/// Mutable state of one run. Only the controller touches it.
struct RunState {
    run_id: String,
    phase: RunPhase,
    trace: Vec<RunPhase>,
    history: Vec<Iteration>,
}

impl RunState {
    fn advance(&mut self, next: RunPhase) {
        if self.phase.can_transition_to(next) {
            self.phase = next;
            self.trace.push(next);
        } else {
            warn!(
                "agentverse::orchestrator: run {} ignored transition {:?} -> {:?}",
                self.run_id, self.phase, next
            );
        }
    }

    fn update_current<F: FnOnce(&mut Iteration)>(&mut self, f: F) {
        if let Some(iteration) = self.history.last_mut() {
            f(iteration);
        }
    }
}

/// Races `fut` against cancellation. Dropping `fut` abandons whatever call it was
/// waiting on, so late results are never observed.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, OrchestratorError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
        output = fut => Ok(output),
    }
}

impl Orchestrator {
    /// Build an orchestrator around explicit clients, e.g. mocks in tests.
    pub fn new(
        mut config: OrchestratorConfig,
        llm: Arc<dyn LlmClient>,
        workers: Arc<dyn WorkerClient>,
    ) -> Result<Self, ConfigError> {
        config.max_discussion_rounds = config.max_discussion_rounds.clamp(1, MAX_DISCUSSION_ROUNDS_CAP);
        let pool = WorkerPool::new(config.worker_urls.clone(), config.max_parallel_workers)
            .ok_or(ConfigError::NoWorkers)?;
        info!(
            "agentverse::orchestrator: {} worker endpoints {:?}, up to {} in parallel, {} discussion rounds",
            pool.endpoints().len(),
            pool.endpoints(),
            pool.bound(),
            config.max_discussion_rounds
        );
        Ok(Self {
            config,
            pool,
            llm,
            workers,
            votes: Arc::new(TokenVoteExtractor),
        })
    }

    /// Build an orchestrator that talks HTTP to the configured backend and workers.
    pub fn from_config(config: OrchestratorConfig) -> Result<Self, ConfigError> {
        let llm = Arc::new(HttpLlmClient::new(config.llm_url.clone(), config.llm_timeout));
        let workers = Arc::new(HttpWorkerClient::new(config.worker_timeout));
        Self::new(config, llm, workers)
    }

    /// Replace the marker-based vote detection (builder pattern).
    pub fn with_vote_extractor(mut self, votes: Arc<dyn VoteExtractor>) -> Self {
        self.votes = votes;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run `task` to completion with no progress listener.
    pub async fn run(&self, task: Task) -> RunReport {
        self.run_with(task, CancellationToken::new(), None).await
    }

    /// Run `task`, stopping early if `cancel` fires. Progress events go to `progress`
    /// when given; the terminal `complete`/`error` event is always the last one sent.
    pub async fn run_with(
        &self,
        task: Task,
        cancel: CancellationToken,
        progress: Option<mpsc::Sender<ProgressEvent>>,
    ) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let (recorder, recorder_task) = RunRecorder::spawn(
            run_id.clone(),
            progress,
            self.config.progress_queue_capacity,
            self.config.progress_flush_timeout,
        );

        info!(
            "agentverse::orchestrator: run {} started (max_iterations={}, threshold={:?})",
            run_id, task.max_iterations, task.score_threshold
        );

        let mut state = RunState {
            run_id: run_id.clone(),
            phase: RunPhase::Recruiting,
            trace: vec![RunPhase::Recruiting],
            history: Vec::new(),
        };

        let result = self.drive(&task, &recorder, &cancel, &mut state).await;

        let (outcome, final_output) = match result {
            Ok(answer) => {
                let (experts_succeeded, experts_attempted) = state
                    .history
                    .last()
                    .and_then(|it| it.execution.as_ref())
                    .map(|e| (e.success_count, e.outputs.len()))
                    .unwrap_or((0, 0));
                (
                    RunOutcome::Completed {
                        experts_succeeded,
                        experts_attempted,
                    },
                    Some(answer),
                )
            }
            Err(OrchestratorError::Cancelled) => {
                state.advance(RunPhase::Cancelled);
                info!(
                    "agentverse::orchestrator: run {} cancelled after {} iterations",
                    run_id,
                    state.history.len()
                );
                (RunOutcome::Cancelled, None)
            }
            Err(OrchestratorError::Fatal(err)) => {
                state.advance(RunPhase::Error);
                error!("agentverse::orchestrator: run {} failed: {}", run_id, err);
                (
                    RunOutcome::Error {
                        stage: err.stage(),
                        message: err.to_string(),
                    },
                    None,
                )
            }
        };

        let last = state.history.last();
        let stages = StageSummaries {
            recruitment: last.and_then(|it| it.recruitment.clone()),
            decision: last.and_then(|it| it.decision.clone()),
            execution: last.and_then(|it| it.execution.clone()),
            evaluation: last.and_then(|it| it.evaluation.clone()),
        };

        let report = RunReport {
            run_id: run_id.clone(),
            task: task.description.clone(),
            iterations_completed: state.history.iter().filter(|it| it.is_complete()).count(),
            duration_seconds: started.elapsed().as_secs_f64(),
            final_output,
            stages,
            llm_requests: recorder.snapshot().await,
            phase_trace: state.trace,
            iteration_history: state.history,
            outcome,
        };

        match &report.outcome {
            RunOutcome::Error { stage, message } => recorder.publish(ProgressEvent::Error {
                stage: *stage,
                message: message.clone(),
                report: Box::new(report.clone()),
            }),
            _ => recorder.publish(ProgressEvent::Complete(Box::new(report.clone()))),
        }

        info!(
            "agentverse::orchestrator: run {} finished with status {} in {:.1}s ({} ledger entries)",
            run_id,
            report.outcome.status(),
            report.duration_seconds,
            report.llm_requests.len()
        );

        // The flush is bounded by `progress_flush_timeout`, so an unread receiver
        // cannot hold the run here.
        drop(recorder);
        if let Err(err) = recorder_task.await {
            warn!("agentverse::orchestrator: run {} recorder task failed: {}", run_id, err);
        }
        report
    }

    async fn drive(
        &self,
        task: &Task,
        recorder: &RecorderHandle,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> Result<String, OrchestratorError> {
        let mut feedback: Option<String> = None;
        let mut last_iteration = 1;

        for number in 1..=task.max_iterations {
            if number > 1 {
                state.advance(RunPhase::Recruiting);
            }
            last_iteration = number;
            let ctx = self.context(task, number, recorder);

            recorder.publish(ProgressEvent::IterationStart {
                iteration: number,
                max_iterations: task.max_iterations,
                message: format!("Starting iteration {} of {}", number, task.max_iterations),
            });
            state.history.push(Iteration::new(number));

            let clock = Instant::now();
            let result = self.iterate(&ctx, feedback.as_deref(), cancel, state).await;
            state.update_current(|it| it.duration_seconds = clock.elapsed().as_secs_f64());
            let verdict = result?;

            recorder.publish(ProgressEvent::IterationComplete {
                iteration: number,
                iteration_history: state.history.clone(),
            });

            if !verdict.should_iterate {
                break;
            }
            if number >= task.max_iterations {
                info!(
                    "agentverse::orchestrator: run {} wants another iteration but reached the cap of {}",
                    state.run_id, task.max_iterations
                );
                break;
            }
            feedback = Some(verdict.feedback);
        }

        state.advance(RunPhase::Synthesizing);
        let ctx = self.context(task, last_iteration, recorder);
        stage_start(&ctx, Stage::Synthesis, "Synthesizing the final answer".to_string());
        let answer = cancellable(cancel, synthesis::run(&ctx, &state.history)).await??;
        stage_complete(
            &ctx,
            Stage::Synthesis,
            format!("Final answer ready ({} chars)", answer.len()),
            &answer,
        );
        state.advance(RunPhase::Done);
        Ok(answer)
    }

    /// One Recruiting..Evaluating pass. Outcomes are written into the current iteration
    /// as soon as each stage finishes, so a failed or cancelled pass leaves a partial entry.
    async fn iterate(
        &self,
        ctx: &StageContext<'_>,
        feedback: Option<&str>,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> Result<EvaluationResult, OrchestratorError> {
        stage_start(ctx, Stage::Recruitment, "Recruiting experts".to_string());
        let roster = cancellable(cancel, recruitment::run(ctx, feedback)).await??;
        stage_complete(
            ctx,
            Stage::Recruitment,
            format!("{} ({})", roster.reasoning, roster.structure.as_str()),
            &roster,
        );
        state.update_current(|it| it.recruitment = Some(roster.clone()));

        state.advance(RunPhase::Deciding);
        stage_start(
            ctx,
            Stage::Decision,
            format!("{} discussion among {} experts", roster.structure.as_str(), roster.experts.len()),
        );
        let agreed = cancellable(cancel, decision::run(ctx, &roster)).await??;
        stage_complete(
            ctx,
            Stage::Decision,
            format!(
                "{} rounds, consensus reached: {}",
                agreed.rounds.len(),
                agreed.consensus_reached
            ),
            &agreed,
        );
        state.update_current(|it| it.decision = Some(agreed.clone()));

        state.advance(RunPhase::Executing);
        stage_start(
            ctx,
            Stage::Execution,
            format!("Dispatching {} subtasks", roster.experts.len()),
        );
        let executed = cancellable(cancel, execution::run(ctx, &roster.experts, &agreed.final_decision)).await?;
        stage_complete(
            ctx,
            Stage::Execution,
            format!("{}/{} experts succeeded", executed.success_count, executed.outputs.len()),
            &executed,
        );
        state.update_current(|it| it.execution = Some(executed.clone()));

        state.advance(RunPhase::Evaluating);
        stage_start(ctx, Stage::Evaluation, "Evaluating results".to_string());
        let verdict = cancellable(cancel, evaluation::run(ctx, &agreed, &executed)).await??;
        stage_complete(
            ctx,
            Stage::Evaluation,
            format!("Score {}/100, goal achieved: {}", verdict.score, verdict.goal_achieved),
            &verdict,
        );
        state.update_current(|it| it.evaluation = Some(verdict.clone()));

        Ok(verdict)
    }

    fn context<'a>(&'a self, task: &'a Task, iteration: usize, recorder: &'a RecorderHandle) -> StageContext<'a> {
        StageContext {
            task,
            iteration,
            config: &self.config,
            llm: self.llm.as_ref(),
            workers: self.workers.as_ref(),
            pool: &self.pool,
            votes: self.votes.as_ref(),
            recorder,
        }
    }
}

fn stage_start(ctx: &StageContext<'_>, stage: Stage, message: String) {
    info!(
        "agentverse::orchestrator: run {} iteration {} stage {} started",
        ctx.recorder.run_id(),
        ctx.iteration,
        stage
    );
    ctx.recorder.publish(ProgressEvent::StageStart {
        iteration: ctx.iteration,
        stage,
        stage_number: stage.number(),
        message,
    });
}

fn stage_complete<T: Serialize>(ctx: &StageContext<'_>, stage: Stage, message: String, detail: &T) {
    ctx.recorder.publish(ProgressEvent::StageComplete {
        iteration: ctx.iteration,
        stage,
        stage_number: stage.number(),
        message,
        detail: serde_json::to_value(detail).unwrap_or(serde_json::Value::Null),
    });
}
