use crate::agentverse::error::StageError;
use crate::agentverse::model::{DecisionOutcome, EvaluationResult, ExecutionOutcome, Stage};
use crate::agentverse::prompts;
use crate::agentverse::reply::parse_evaluation;
use crate::agentverse::stages::StageContext;
use log::info;

/// Score the iteration. Without a score there is no meaningful way to continue, so
/// exchange or parse failures are fatal.
pub async fn run(
    ctx: &StageContext<'_>,
    decision: &DecisionOutcome,
    execution: &ExecutionOutcome,
) -> Result<EvaluationResult, StageError> {
    let prompt = prompts::evaluation(
        &ctx.task.description,
        &decision.final_decision,
        &execution.outputs,
        ctx.iteration,
        ctx.task.max_iterations,
    );

    let text = ctx
        .ask_llm(Stage::Evaluation, "evaluation", prompt, None)
        .await
        .map_err(|source| StageError::Llm {
            stage: Stage::Evaluation,
            source,
        })?;

    let reported = parse_evaluation(&text).map_err(|reason| StageError::Unparsable {
        stage: Stage::Evaluation,
        reason,
    })?;

    let result = apply_rules(reported, ctx.task.score_threshold);
    info!(
        "agentverse::evaluation: run {} iteration {} score={} goal_achieved={} should_iterate={}",
        ctx.recorder.run_id(),
        ctx.iteration,
        result.score,
        result.goal_achieved,
        result.should_iterate
    );
    Ok(result)
}

/// Rules that override the model's own verdict.
///
/// A configured threshold decides `goal_achieved` from the score alone. An achieved goal
/// never iterates. Iterating without feedback gets feedback built from the rationale and
/// missing aspects, since feedback is all the next recruitment sees.
pub fn apply_rules(mut result: EvaluationResult, threshold: Option<u8>) -> EvaluationResult {
    if let Some(threshold) = threshold {
        result.goal_achieved = result.score >= threshold;
        result.should_iterate = !result.goal_achieved;
    }
    if result.goal_achieved {
        result.should_iterate = false;
    }
    if result.should_iterate && result.feedback.trim().is_empty() {
        let mut parts = vec![format!("Score {}/100.", result.score)];
        if !result.rationale.trim().is_empty() {
            parts.push(result.rationale.trim().to_string());
        }
        if !result.missing_aspects.is_empty() {
            parts.push(format!("Missing: {}.", result.missing_aspects.join("; ")));
        }
        result.feedback = parts.join(" ");
    }
    result
}
