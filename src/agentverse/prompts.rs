//! Prompt builders for every exchange the orchestrator makes.
//!
//! Each builder takes borrowed run data and returns the full prompt text; nothing here
//! talks to the network.

use crate::agentverse::model::{EvaluationResult, ExecutionOutput, Expert, Iteration};
use crate::agentverse::roles::ExpertRole;
use std::fmt::Write;

/// Characters of the synthesized decision embedded in each execution prompt.
pub const DECISION_CONTEXT_CHARS: usize = 500;

/// System prompt for the orchestrator's own exchanges.
pub const ORCHESTRATOR_SYSTEM: &str =
    "You coordinate a team of AI experts. When asked for JSON, reply with JSON and nothing else.";

pub fn recruitment(task: &str, feedback: Option<&str>, max_experts: usize) -> String {
    let roles: Vec<&str> = ExpertRole::ALL.iter().map(|r| r.as_str()).collect();
    let feedback_section = match feedback {
        Some(fb) if !fb.trim().is_empty() => format!(
            "\nThe previous attempt was evaluated and fell short. Evaluator feedback:\n{}\nAdjust the team to address it.\n",
            fb
        ),
        _ => String::new(),
    };
    format!(
        "You coordinate a team of expert agents. Decide which experts this task needs.\n\n\
         Task:\n{task}\n{feedback_section}\n\
         Pick roles from: {roles}. Use at most {max} experts in total.\n\
         Choose a communication structure: \"horizontal\" (everyone discusses as equals) or \
         \"vertical\" (the first expert proposes, the others review).\n\n\
         Reply with JSON only, shaped like this:\n\
         {{\"experts\": [{{\"role\": \"...\", \"responsibilities\": \"...\", \"contract\": \"...\"}}],\n \
         \"communication_structure\": \"horizontal\" | \"vertical\",\n \
         \"execution_order\": [\"role\", ...],\n \
         \"reasoning\": \"one or two sentences\"}}",
        task = task,
        feedback_section = feedback_section,
        roles = roles.join(", "),
        max = max_experts,
    )
}

pub fn horizontal_round(expert: &Expert, task: &str, history: &str, round: usize) -> String {
    format!(
        "{persona}\nYou are the {role} in a discussion between equals.\n\n\
         Your contract:\n{contract}\n\nYour responsibilities:\n{resp}\n\n\
         Task:\n{task}\n\nDiscussion so far:\n{history}\n\n\
         This is round {round}. Build on what the others said. If you think the group has \
         agreed and nothing more is needed, end your reply with [CONSENSUS].",
        persona = expert.role.profile().persona,
        role = expert.role,
        contract = expert.contract,
        resp = expert.responsibilities,
        task = task,
        history = if history.is_empty() { "(nothing yet)" } else { history },
        round = round,
    )
}

/// Appends one finished round to the running transcript, verbatim.
pub fn append_round(history: &mut String, round: usize, lines: &[(ExpertRole, &str)]) {
    let _ = write!(history, "\n--- Round {} ---\n", round);
    for (role, text) in lines {
        let _ = writeln!(history, "{}: {}", role.as_str().to_uppercase(), text);
    }
}

pub fn vertical_solver(solver: &Expert, task: &str, previous: Option<(&str, &str)>) -> String {
    let revision = match previous {
        Some((proposal, critiques)) => format!(
            "\nYour previous proposal:\n{}\n\nReviewer critiques:\n{}\n\nRevise the proposal to address them.\n",
            proposal, critiques
        ),
        None => String::new(),
    };
    format!(
        "{persona}\nYou are the solver. Propose a concrete, actionable solution.\n\n\
         Your contract:\n{contract}\n\nTask:\n{task}\n{revision}",
        persona = solver.role.profile().persona,
        contract = solver.contract,
        task = task,
        revision = revision,
    )
}

pub fn vertical_reviewer(reviewer: &Expert, task: &str, proposal: &str) -> String {
    format!(
        "{persona}\nYou are a {role} reviewing a proposed solution.\n\n\
         Your contract:\n{contract}\n\nTask:\n{task}\n\nProposal:\n{proposal}\n\n\
         Check it for errors, gaps and weak spots. If it is acceptable as it stands, reply \
         with [APPROVED]. Otherwise give specific, constructive criticism.",
        persona = reviewer.role.profile().persona,
        role = reviewer.role,
        contract = reviewer.contract,
        task = task,
        proposal = proposal,
    )
}

pub fn synthesize_discussion(task: &str, transcript: &str) -> String {
    format!(
        "Turn the discussion below into one clear plan of action.\n\n\
         Task:\n{}\n\nDiscussion:\n{}\n\nState what should be done, by whom, in what order.",
        task, transcript
    )
}

/// The per-expert subtask text. Workers see this as their assignment.
pub fn subtask(expert: &Expert, decision: &str) -> String {
    format!(
        "Working as the {role}:\n\nResponsibilities: {resp}\n\n\
         Carry out your part of this plan:\n{decision}\n\nStay within your expertise.",
        role = expert.role,
        resp = expert.responsibilities,
        decision = decision,
    )
}

pub fn execution(expert: &Expert, task: &str, subtask: &str, decision: &str) -> String {
    let context: String = decision.chars().take(DECISION_CONTEXT_CHARS).collect();
    format!(
        "You are the {role} executing an assigned subtask.\n\n\
         Your contract:\n{contract}\n\nTask:\n{task}\n\nAssigned subtask:\n{subtask}\n\n\
         Decision context:\n{context}\n\nProduce a complete, detailed result.",
        role = expert.role,
        contract = expert.contract,
        task = task,
        subtask = subtask,
        context = context,
    )
}

pub fn evaluation(
    task: &str,
    decision: &str,
    outputs: &[ExecutionOutput],
    iteration: usize,
    max_iterations: usize,
) -> String {
    format!(
        "Judge whether the team achieved the task.\n\n\
         Task:\n{task}\n\nAgreed plan:\n{decision}\n\nResults:\n{results}\n\n\
         This is iteration {iteration} of {max}.\n\n\
         Score each criterion from 0 to 100: completeness, correctness, clarity, relevance, \
         actionability. The overall score weights them 30/30/15/15/10.\n\n\
         Reply with JSON only:\n\
         {{\"goal_achieved\": bool, \"score\": int, \
         \"criteria\": {{\"completeness\": int, \"correctness\": int, \"clarity\": int, \"relevance\": int, \"actionability\": int}}, \
         \"rationale\": \"...\", \"feedback\": \"...\", \"missing_aspects\": [\"...\"], \"should_iterate\": bool}}",
        task = task,
        decision = decision,
        results = format_outputs(outputs),
        iteration = iteration,
        max = max_iterations,
    )
}

pub fn final_synthesis(
    task: &str,
    history: &[Iteration],
    decision: &str,
    outputs: &[ExecutionOutput],
    evaluation: Option<&EvaluationResult>,
) -> String {
    let mut summary = String::new();
    for it in history {
        let _ = writeln!(summary, "{}", iteration_line(it));
    }
    let verdict = match evaluation {
        Some(e) => format!("score {}/100, goal achieved: {}. {}", e.score, e.goal_achieved, e.feedback),
        None => "(not evaluated)".to_string(),
    };
    format!(
        "Write the final answer for the user. They will see only this answer, not the \
         team's work below, so it must stand on its own.\n\n\
         Task:\n{task}\n\nIterations:\n{summary}\nAgreed plan:\n{decision}\n\n\
         Team results:\n{results}\n\nEvaluation:\n{verdict}\n\n\
         Include every detail the task needs (full code, every step). Do not summarise it away.",
        task = task,
        summary = summary,
        decision = decision,
        results = format_outputs(outputs),
        verdict = verdict,
    )
}

/// One-line summary of an iteration.
pub fn iteration_line(it: &Iteration) -> String {
    let experts = it.recruitment.as_ref().map(|r| r.experts.len()).unwrap_or(0);
    let executed = it
        .execution
        .as_ref()
        .map(|e| format!("{}/{} succeeded", e.success_count, e.outputs.len()))
        .unwrap_or_else(|| "not executed".to_string());
    let score = it
        .evaluation
        .as_ref()
        .map(|e| e.score.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("Iteration {}: {} experts, {}, score {}", it.number, experts, executed, score)
}

fn format_outputs(outputs: &[ExecutionOutput]) -> String {
    let mut text = String::new();
    for o in outputs {
        let status = if o.success { "ok" } else { "FAILED" };
        let _ = writeln!(text, "[{} #{} {}]\n{}\n", o.role, o.expert_index + 1, status, o.output);
    }
    if text.is_empty() {
        text.push_str("(no results)");
    }
    text
}
