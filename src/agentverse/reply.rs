//! Turning model replies into structured stage outcomes.
//!
//! Models wrap JSON in prose or Markdown fences often enough that [`extract_json`]
//! tries, in order: the whole text, the contents of a fenced block, and the slice
//! between the first `{` and the last `}`.
//!
//! Past that, fields are read leniently: `null` counts as absent, list entries that are
//! not strings are skipped, and flags may arrive as `"true"`/`"false"`.

use crate::agentverse::model::{CommunicationStructure, CriteriaScores, EvaluationResult};
use crate::agentverse::roles::ExpertRole;
use log::warn;
use serde::Deserialize;
use serde_json::Value;

/// Find a JSON object in `text`.
pub fn extract_json(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = fenced_block(trimmed) {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(fenced) {
            return Ok(value);
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => serde_json::from_str::<Value>(&trimmed[start..=end])
            .map_err(|e| format!("invalid JSON object: {}", e)),
        _ => Err("no JSON object found in reply".to_string()),
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// One expert as the recruiter described it.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpertSpec {
    pub role: ExpertRole,
    pub responsibilities: String,
    pub contract: String,
}

/// Recruitment reply after normalisation, before endpoints are bound.
#[derive(Clone, Debug)]
pub struct RecruitmentPlan {
    pub experts: Vec<ExpertSpec>,
    pub structure: CommunicationStructure,
    pub execution_order: Vec<String>,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct RawExpert {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    responsibilities: Option<String>,
    #[serde(default)]
    contract: Option<String>,
}

#[derive(Deserialize)]
struct RawRecruitment {
    #[serde(default)]
    experts: Option<Vec<RawExpert>>,
    #[serde(default)]
    communication_structure: Option<String>,
    #[serde(default)]
    execution_order: Option<Value>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse a recruitment reply, keeping at most `max_experts` experts.
pub fn parse_recruitment(text: &str, max_experts: usize) -> Result<RecruitmentPlan, String> {
    let value = extract_json(text)?;
    let raw: RawRecruitment =
        serde_json::from_value(value).map_err(|e| format!("unexpected recruitment shape: {}", e))?;

    let mut experts: Vec<ExpertSpec> = raw
        .experts
        .unwrap_or_default()
        .into_iter()
        .take(max_experts.max(1))
        .map(|e| {
            let role = ExpertRole::parse_or_executor(e.role.as_deref());
            let profile = role.profile();
            ExpertSpec {
                role,
                responsibilities: non_empty(e.responsibilities)
                    .unwrap_or_else(|| profile.default_responsibilities.to_string()),
                contract: non_empty(e.contract).unwrap_or_else(|| profile.default_contract.to_string()),
            }
        })
        .collect();

    if experts.is_empty() {
        warn!("agentverse::reply: recruitment named no experts, using a single executor");
        let profile = ExpertRole::Executor.profile();
        experts.push(ExpertSpec {
            role: ExpertRole::Executor,
            responsibilities: profile.default_responsibilities.to_string(),
            contract: profile.default_contract.to_string(),
        });
    }

    let structure = match raw.communication_structure.as_deref() {
        Some(s) => CommunicationStructure::parse(s).unwrap_or_else(|| {
            warn!("agentverse::reply: unknown communication structure {:?}, using horizontal", s);
            CommunicationStructure::Horizontal
        }),
        None => CommunicationStructure::Horizontal,
    };

    let reasoning = non_empty(raw.reasoning).unwrap_or_else(|| {
        format!("{} experts recruited for {} collaboration", experts.len(), structure.as_str())
    });

    Ok(RecruitmentPlan {
        experts,
        structure,
        execution_order: raw.execution_order.as_ref().map(string_list).unwrap_or_default(),
        reasoning,
    })
}

#[derive(Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    goal_achieved: Option<Value>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    criteria: Option<Value>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    missing_aspects: Option<Value>,
    #[serde(default)]
    should_iterate: Option<Value>,
}

/// Parse an evaluation reply as the model reported it. Threshold and iteration-cap
/// rules are applied afterwards by the evaluation stage.
pub fn parse_evaluation(text: &str) -> Result<EvaluationResult, String> {
    let value = extract_json(text)?;
    let raw: RawEvaluation =
        serde_json::from_value(value).map_err(|e| format!("unexpected evaluation shape: {}", e))?;

    let criteria = raw
        .criteria
        .as_ref()
        .map(|c| CriteriaScores {
            completeness: c.get("completeness").and_then(score_value),
            correctness: c.get("correctness").and_then(score_value),
            clarity: c.get("clarity").and_then(score_value),
            relevance: c.get("relevance").and_then(score_value),
            actionability: c.get("actionability").and_then(score_value),
        })
        .unwrap_or_default();

    Ok(EvaluationResult {
        score: raw.score.as_ref().and_then(score_value).unwrap_or(50),
        goal_achieved: raw.goal_achieved.as_ref().and_then(flag_value).unwrap_or(false),
        criteria,
        rationale: raw.rationale.unwrap_or_default(),
        feedback: raw.feedback.unwrap_or_default(),
        missing_aspects: raw.missing_aspects.as_ref().map(string_list).unwrap_or_default(),
        should_iterate: raw.should_iterate.as_ref().and_then(flag_value).unwrap_or(false),
    })
}

/// Numbers (or numeric strings) clamped to 0..=100.
fn score_value(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(n.round().max(0.0).min(100.0) as u8)
}

/// Booleans, or the strings `true`/`false`/`yes`/`no` in any case.
fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// The string entries of an array; a lone string counts as a one-item list.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
