//! Fan the decision out to every expert's worker and collect what comes back.
//!
//! At most `min(experts, pool bound)` calls are in flight at once, each under the worker
//! timeout. A failed or timed-out call becomes a failed [`ExecutionOutput`]; the stage
//! itself never fails.

use crate::agentverse::event::{preview, ProgressEvent};
use crate::agentverse::model::{ExecutionOutcome, ExecutionOutput, Expert, Stage};
use crate::agentverse::prompts;
use crate::agentverse::stages::StageContext;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use log::warn;
use std::time::Instant;

const OUTPUT_PREVIEW_CHARS: usize = 200;

pub async fn run(ctx: &StageContext<'_>, experts: &[Expert], decision: &str) -> ExecutionOutcome {
    let total = experts.len();
    let parallelism = total.min(ctx.pool.bound()).max(1);

    let calls: Vec<_> = experts.iter().map(|expert| execute_one(ctx, expert, decision)).collect();
    let mut in_flight = stream::iter(calls).buffer_unordered(parallelism);

    let mut outputs = Vec::with_capacity(total);
    while let Some(output) = in_flight.next().await {
        if !output.success {
            warn!(
                "agentverse::execution: run {} expert-{} failed: {}",
                ctx.recorder.run_id(),
                output.expert_index + 1,
                output.output
            );
        }
        ctx.recorder.publish(ProgressEvent::ExecutionResult {
            iteration: ctx.iteration,
            expert_index: output.expert_index,
            role: output.role,
            success: output.success,
            output_preview: preview(&output.output, OUTPUT_PREVIEW_CHARS),
            completed: outputs.len() + 1,
            total,
        });
        outputs.push(output);
    }

    ExecutionOutcome::from_outputs(outputs)
}

async fn execute_one(ctx: &StageContext<'_>, expert: &Expert, decision: &str) -> ExecutionOutput {
    let subtask = prompts::subtask(expert, decision);
    let prompt = prompts::execution(expert, &ctx.task.description, &subtask, decision);
    let label = format!("execute_{}", expert.role);

    let started_at = Utc::now();
    let clock = Instant::now();
    let result = ctx.ask_worker(Stage::Execution, label, expert, prompt, None).await;

    let (success, output) = match result {
        Ok(reply) => (true, reply.output),
        Err(err) => (false, format!("Execution failed: {}", err)),
    };

    ExecutionOutput {
        expert_index: expert.index,
        role: expert.role,
        subtask,
        success,
        output,
        started_at,
        duration_seconds: clock.elapsed().as_secs_f64(),
    }
}
