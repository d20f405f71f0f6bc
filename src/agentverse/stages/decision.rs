//! Collaborative decision: horizontal rounds or solver/reviewer iterations, then one
//! orchestrator exchange that condenses the discussion into a single decision.
//!
//! Expert calls inside a round are issued together and joined before the round is
//! judged. A failed expert call is kept as a non-participating response and counts as
//! dissent; only a failed solver call aborts the stage.

use crate::agentverse::error::StageError;
use crate::agentverse::event::{preview, ProgressEvent};
use crate::agentverse::model::{
    CommunicationStructure, DecisionOutcome, DiscussionRound, Expert, ExpertResponse, RecruitmentOutcome,
    ReviewerCritique, Stage,
};
use crate::agentverse::prompts;
use crate::agentverse::stages::StageContext;
use futures_util::future::join_all;
use log::{debug, warn};
use std::fmt::Write;

const PROPOSAL_PREVIEW_CHARS: usize = 200;

pub async fn run(ctx: &StageContext<'_>, recruitment: &RecruitmentOutcome) -> Result<DecisionOutcome, StageError> {
    let (rounds, transcript) = match recruitment.structure {
        CommunicationStructure::Horizontal => horizontal(ctx, &recruitment.experts).await,
        CommunicationStructure::Vertical => vertical(ctx, &recruitment.experts).await?,
    };

    let consensus_reached = rounds.last().map(DiscussionRound::settled).unwrap_or(false);

    let prompt = prompts::synthesize_discussion(&ctx.task.description, &transcript);
    let final_decision = ctx
        .ask_llm(Stage::Decision, "decision_synthesis", prompt, Some(2048))
        .await
        .map_err(|source| StageError::Llm {
            stage: Stage::Decision,
            source,
        })?;

    Ok(DecisionOutcome {
        structure: recruitment.structure,
        rounds,
        final_decision,
        consensus_reached,
    })
}

/// Democratic rounds. Stops as soon as every response carries the consensus marker;
/// otherwise the last round stands as the working answer.
async fn horizontal(ctx: &StageContext<'_>, experts: &[Expert]) -> (Vec<DiscussionRound>, String) {
    let mut rounds = Vec::new();
    let mut history = String::new();

    for round in 1..=ctx.config.max_discussion_rounds {
        let calls = experts.iter().map(|expert| {
            let prompt = prompts::horizontal_round(expert, &ctx.task.description, &history, round);
            let label = format!("horizontal_round_{}", round);
            async move {
                let result = ctx
                    .ask_worker(Stage::Decision, label, expert, prompt, Some(round))
                    .await;
                (expert, result)
            }
        });

        let responses: Vec<ExpertResponse> = join_all(calls)
            .await
            .into_iter()
            .map(|(expert, result)| match result {
                Ok(reply) => ExpertResponse {
                    expert_index: expert.index,
                    role: expert.role,
                    consensus: ctx.votes.consensus(&reply.output),
                    response: reply.output,
                    participated: true,
                },
                Err(err) => {
                    warn!(
                        "agentverse::decision: run {} {} sat out round {}: {}",
                        ctx.recorder.run_id(),
                        expert.source(),
                        round,
                        err
                    );
                    ExpertResponse {
                        expert_index: expert.index,
                        role: expert.role,
                        response: format!("[Agent error: {}]", err),
                        consensus: false,
                        participated: false,
                    }
                }
            })
            .collect();

        let consensus = !responses.is_empty() && responses.iter().all(|r| r.consensus);
        let lines: Vec<_> = responses.iter().map(|r| (r.role, r.response.as_str())).collect();
        prompts::append_round(&mut history, round, &lines);

        debug!(
            "agentverse::decision: run {} round {} consensus={}",
            ctx.recorder.run_id(),
            round,
            consensus
        );
        ctx.recorder.publish(ProgressEvent::DiscussionRound {
            iteration: ctx.iteration,
            round,
            responses: responses.clone(),
            consensus,
        });
        rounds.push(DiscussionRound::Horizontal {
            round,
            responses,
            consensus,
        });

        if consensus {
            break;
        }
    }

    (rounds, history)
}

/// Solver proposes, reviewers critique in parallel, solver revises. Stops once every
/// reviewer approves; with no reviewers the first proposal is accepted.
async fn vertical(ctx: &StageContext<'_>, experts: &[Expert]) -> Result<(Vec<DiscussionRound>, String), StageError> {
    let (solver, reviewers) = match experts.split_first() {
        Some(split) => split,
        None => return Ok((Vec::new(), String::new())),
    };

    let mut rounds = Vec::new();
    let mut transcript = String::new();
    let mut previous: Option<(String, String)> = None;

    for round in 1..=ctx.config.max_discussion_rounds {
        let prompt = prompts::vertical_solver(
            solver,
            &ctx.task.description,
            previous.as_ref().map(|(p, c)| (p.as_str(), c.as_str())),
        );
        let proposal = ctx
            .ask_worker(Stage::Decision, format!("vertical_solver_{}", round), solver, prompt, Some(round))
            .await
            .map_err(StageError::Solver)?
            .output;

        let reviews = reviewers.iter().map(|reviewer| {
            let prompt = prompts::vertical_reviewer(reviewer, &ctx.task.description, &proposal);
            let label = format!("vertical_review_{}", round);
            async move {
                let result = ctx
                    .ask_worker(Stage::Decision, label, reviewer, prompt, Some(round))
                    .await;
                (reviewer, result)
            }
        });

        let critiques: Vec<ReviewerCritique> = join_all(reviews)
            .await
            .into_iter()
            .map(|(reviewer, result)| match result {
                Ok(reply) => ReviewerCritique {
                    reviewer_index: reviewer.index,
                    role: reviewer.role,
                    approved: ctx.votes.approval(&reply.output),
                    critique: reply.output,
                    participated: true,
                },
                Err(err) => {
                    warn!(
                        "agentverse::decision: run {} reviewer {} failed in iteration {}: {}",
                        ctx.recorder.run_id(),
                        reviewer.source(),
                        round,
                        err
                    );
                    ReviewerCritique {
                        reviewer_index: reviewer.index,
                        role: reviewer.role,
                        critique: format!("[Agent error: {}]", err),
                        approved: false,
                        participated: false,
                    }
                }
            })
            .collect();

        let all_approved = critiques.iter().all(|c| c.approved);

        let _ = write!(
            transcript,
            "\n--- Iteration {} ---\nSOLVER ({}): {}\n",
            round, solver.role, proposal
        );
        for c in &critiques {
            let _ = writeln!(transcript, "{}: {}", c.role.as_str().to_uppercase(), c.critique);
        }

        ctx.recorder.publish(ProgressEvent::VerticalIteration {
            iteration: ctx.iteration,
            round,
            proposal_preview: preview(&proposal, PROPOSAL_PREVIEW_CHARS),
            critiques: critiques.clone(),
            all_approved,
        });

        let joined: Vec<String> = critiques
            .iter()
            .map(|c| format!("{}: {}", c.role, c.critique))
            .collect();

        rounds.push(DiscussionRound::Vertical {
            round,
            solver_index: solver.index,
            proposal: proposal.clone(),
            critiques,
            all_approved,
        });

        if all_approved {
            break;
        }
        previous = Some((proposal, joined.join("\n")));
    }

    Ok((rounds, transcript))
}
