use crate::agentverse::error::StageError;
use crate::agentverse::model::{Expert, RecruitmentOutcome, Stage};
use crate::agentverse::prompts;
use crate::agentverse::reply::parse_recruitment;
use crate::agentverse::stages::StageContext;
use log::info;

/// Ask the model for this iteration's roster and bind each expert to a worker endpoint.
///
/// `feedback` is the previous evaluation's feedback and is the only thing carried over
/// between iterations. Any failure here is fatal; recruitment is never retried.
pub async fn run(ctx: &StageContext<'_>, feedback: Option<&str>) -> Result<RecruitmentOutcome, StageError> {
    let bound = ctx.pool.bound();
    let prompt = prompts::recruitment(&ctx.task.description, feedback, bound);

    let text = ctx
        .ask_llm(Stage::Recruitment, "recruitment", prompt, None)
        .await
        .map_err(|source| StageError::Llm {
            stage: Stage::Recruitment,
            source,
        })?;

    let plan = parse_recruitment(&text, bound).map_err(|reason| StageError::Unparsable {
        stage: Stage::Recruitment,
        reason,
    })?;

    let experts: Vec<Expert> = plan
        .experts
        .into_iter()
        .enumerate()
        .map(|(index, planned)| Expert {
            index,
            role: planned.role,
            responsibilities: planned.responsibilities,
            contract: planned.contract,
            endpoint: ctx.pool.endpoint_for(index).to_string(),
        })
        .collect();

    info!(
        "agentverse::recruitment: run {} iteration {} recruited {} experts ({})",
        ctx.recorder.run_id(),
        ctx.iteration,
        experts.len(),
        plan.structure.as_str()
    );

    Ok(RecruitmentOutcome {
        experts,
        structure: plan.structure,
        execution_order: plan.execution_order,
        reasoning: plan.reasoning,
    })
}
