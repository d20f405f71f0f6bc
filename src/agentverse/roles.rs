//! Expert roles and the worker pool they are bound to.
//!
//! Roles form a closed set. Everything role-specific (default responsibilities, the
//! contract handed to the worker, the persona line used in prompts) lives in one
//! [`RoleProfile`] table entry, so adding a role means adding a variant and a row.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpertRole {
    Planner,
    Researcher,
    Executor,
    Critic,
    Summarizer,
}

/// Per-role behaviour.
pub struct RoleProfile {
    pub role: ExpertRole,
    pub name: &'static str,
    pub persona: &'static str,
    pub default_responsibilities: &'static str,
    pub default_contract: &'static str,
}

static PROFILES: [RoleProfile; 5] = [
    RoleProfile {
        role: ExpertRole::Planner,
        name: "planner",
        persona: "You break problems into ordered, concrete steps.",
        default_responsibilities: "Lay out the plan and the order of work",
        default_contract: "Produce a numbered plan. Name dependencies between steps explicitly.",
    },
    RoleProfile {
        role: ExpertRole::Researcher,
        name: "researcher",
        persona: "You gather facts, constraints and prior art before anyone commits.",
        default_responsibilities: "Collect the information the task depends on",
        default_contract: "Report findings as short factual statements. Flag anything uncertain.",
    },
    RoleProfile {
        role: ExpertRole::Executor,
        name: "executor",
        persona: "You turn agreed plans into finished work.",
        default_responsibilities: "Execute the given task",
        default_contract: "Deliver the concrete result. Include complete code or steps where asked.",
    },
    RoleProfile {
        role: ExpertRole::Critic,
        name: "critic",
        persona: "You look for errors, gaps and risks in what others propose.",
        default_responsibilities: "Review proposals for correctness and completeness",
        default_contract: "List concrete problems with suggested fixes. Do not rewrite the whole answer.",
    },
    RoleProfile {
        role: ExpertRole::Summarizer,
        name: "summarizer",
        persona: "You condense material into a clear, faithful summary.",
        default_responsibilities: "Summarize the material for the user",
        default_contract: "Keep every key point, drop repetition, and preserve the source's meaning.",
    },
];

impl ExpertRole {
    pub const ALL: [ExpertRole; 5] = [
        ExpertRole::Planner,
        ExpertRole::Researcher,
        ExpertRole::Executor,
        ExpertRole::Critic,
        ExpertRole::Summarizer,
    ];

    pub fn profile(self) -> &'static RoleProfile {
        // PROFILES is ordered like the enum
        &PROFILES[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.profile().name
    }

    /// Strict parse; returns `None` for anything outside the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        let needle = value.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|r| r.as_str() == needle)
    }

    /// Lenient parse used on model output: unknown or missing roles become `Executor`.
    pub fn parse_or_executor(value: Option<&str>) -> Self {
        match value {
            Some(raw) => Self::parse(raw).unwrap_or_else(|| {
                warn!("agentverse::roles: unknown role {:?}, using executor", raw);
                ExpertRole::Executor
            }),
            None => ExpertRole::Executor,
        }
    }
}

impl fmt::Display for ExpertRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed list of worker endpoints. Expert `i` always maps to `endpoints[i % len]`.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    endpoints: Vec<String>,
    max_parallel: usize,
}

impl WorkerPool {
    /// `None` when `endpoints` is empty.
    pub fn new(endpoints: Vec<String>, max_parallel: usize) -> Option<Self> {
        if endpoints.is_empty() {
            return None;
        }
        Some(Self {
            endpoints,
            max_parallel: max_parallel.max(1),
        })
    }

    pub fn endpoint_for(&self, expert_index: usize) -> &str {
        &self.endpoints[expert_index % self.endpoints.len()]
    }

    /// Upper bound on recruited experts and on concurrent worker calls.
    pub fn bound(&self) -> usize {
        self.max_parallel
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_table_matches_enum_order() {
        for role in ExpertRole::ALL.iter() {
            assert_eq!(role.profile().role, *role);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_lenient_fallback_is_executor() {
        assert_eq!(ExpertRole::parse(" Critic "), Some(ExpertRole::Critic));
        assert_eq!(ExpertRole::parse("wizard"), None);
        assert_eq!(ExpertRole::parse_or_executor(Some("wizard")), ExpertRole::Executor);
        assert_eq!(ExpertRole::parse_or_executor(None), ExpertRole::Executor);
    }

    #[test]
    fn endpoints_wrap_around_the_pool() {
        let pool = WorkerPool::new(vec!["http://a".into(), "http://b".into()], 5).unwrap();
        assert_eq!(pool.endpoint_for(0), "http://a");
        assert_eq!(pool.endpoint_for(1), "http://b");
        assert_eq!(pool.endpoint_for(4), "http://a");
        assert!(WorkerPool::new(Vec::new(), 5).is_none());
    }
}
