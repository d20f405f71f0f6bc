//! # AgentVerse
//!
//! AgentVerse coordinates a pool of expert worker processes and a language-model backend to
//! solve a task in four stages, repeated while the evaluator asks for another attempt:
//!
//! 1. **Recruitment**: the model picks a roster of experts (planner, researcher, executor,
//!    critic, summarizer) and a communication structure.
//! 2. **Decision**: the experts negotiate. In *horizontal* mode everyone speaks each round
//!    until all of them write `[CONSENSUS]`; in *vertical* mode the first expert proposes
//!    and the rest review until all of them write `[APPROVED]`. The orchestrator then
//!    condenses the discussion into one decision.
//! 3. **Execution**: each expert's worker receives its share of the decision. Calls run in
//!    parallel under a bound and a timeout; failures are recorded, not fatal.
//! 4. **Evaluation**: the model scores the results and decides whether to iterate, feeding
//!    its feedback into the next recruitment.
//!
//! A final synthesis exchange turns the last iteration into the user-facing answer.
//!
//! Every model exchange lands in an ordered ledger, and progress can be streamed to
//! clients as server-sent events through [`server::router`].
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use agentverse::{Orchestrator, OrchestratorConfig, Task};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     agentverse::init_logger();
//!
//!     let orchestrator = Orchestrator::from_config(OrchestratorConfig::from_env()?)?;
//!     let report = orchestrator
//!         .run(Task::new("Draft a migration plan from cron to a job queue").with_score_threshold(80))
//!         .await;
//!
//!     match report.final_output {
//!         Some(answer) => println!("{}", answer),
//!         None => eprintln!("run ended as {}", report.outcome.status()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Plugging in other backends
//!
//! The orchestrator only sees the [`LlmClient`] and [`WorkerClient`] traits, so any
//! transport (or a scripted mock) can stand in for the HTTP clients in [`clients`].

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Verbosity follows `RUST_LOG`, e.g. `RUST_LOG=agentverse=debug` to see every ledger
/// append and progress event.
///
/// ```rust
/// agentverse::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

pub mod agentverse;

pub use agentverse::clients;
pub use agentverse::config;
pub use agentverse::config::OrchestratorConfig;
pub use agentverse::error;
pub use agentverse::event;
pub use agentverse::event::ProgressEvent;
pub use agentverse::ledger;
pub use agentverse::llm_client;
pub use agentverse::llm_client::{LlmClient, LlmReply, LlmRequest, TokenUsage};
pub use agentverse::model;
pub use agentverse::model::{RunOutcome, RunReport, Task};
pub use agentverse::orchestrator;
pub use agentverse::prompts;
pub use agentverse::recorder;
pub use agentverse::reply;
pub use agentverse::roles;
pub use agentverse::roles::{ExpertRole, WorkerPool};
pub use agentverse::server;
pub use agentverse::stages;
pub use agentverse::vote;
pub use agentverse::vote::{TokenVoteExtractor, VoteExtractor};
pub use agentverse::worker_client;
pub use agentverse::worker_client::{WorkerClient, WorkerReply, WorkerRequest};
pub use agentverse::Orchestrator;
