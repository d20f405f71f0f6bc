use crate::agentverse::error::StageError;
use crate::agentverse::model::{Iteration, Stage};
use crate::agentverse::prompts;
use crate::agentverse::stages::StageContext;

/// The final user-facing answer, built from the most recent iteration plus a one-line
/// summary of every iteration.
pub async fn run(ctx: &StageContext<'_>, history: &[Iteration]) -> Result<String, StageError> {
    let latest = history.last();
    let decision = latest
        .and_then(|it| it.decision.as_ref())
        .map(|d| d.final_decision.as_str())
        .unwrap_or("");
    let outputs = latest
        .and_then(|it| it.execution.as_ref())
        .map(|e| e.outputs.as_slice())
        .unwrap_or(&[]);
    let evaluation = latest.and_then(|it| it.evaluation.as_ref());

    let prompt = prompts::final_synthesis(&ctx.task.description, history, decision, outputs, evaluation);
    ctx.ask_llm(Stage::Synthesis, "final_synthesis", prompt, Some(4096))
        .await
        .map_err(|source| StageError::Llm {
            stage: Stage::Synthesis,
            source,
        })
}
