//! Orchestrator configuration.
//!
//! [`OrchestratorConfig`] is a plain struct: build it by hand, start from
//! [`Default`], or read the deployment environment with [`OrchestratorConfig::from_env`].
//! The server binary layers command-line flags on top.
//!
//! # Example
//!
//! ```rust
//! use agentverse::OrchestratorConfig;
//! use std::time::Duration;
//!
//! let config = OrchestratorConfig {
//!     worker_urls: vec!["http://10.0.0.5:8102/subtask".into(), "http://10.0.0.6:8102/subtask".into()],
//!     worker_timeout: Duration::from_secs(30),
//!     ..OrchestratorConfig::default()
//! };
//! assert_eq!(config.max_parallel_workers, 5);
//! ```

use crate::agentverse::error::ConfigError;
use crate::agentverse::model::MAX_ITERATIONS_CAP;
use std::collections::HashMap;
use std::time::Duration;

/// Upper bound on rounds for both decision protocols.
pub const MAX_DISCUSSION_ROUNDS_CAP: usize = 3;

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Completion endpoint of the language-model backend.
    pub llm_url: String,
    pub llm_timeout: Duration,
    /// Worker endpoints; expert `i` is bound to `worker_urls[i % len]`.
    pub worker_urls: Vec<String>,
    pub worker_timeout: Duration,
    /// Caps both the number of recruited experts and concurrent worker calls.
    pub max_parallel_workers: usize,
    /// Rounds per decision protocol, at most [`MAX_DISCUSSION_ROUNDS_CAP`].
    pub max_discussion_rounds: usize,
    /// Used when a request does not say how many iterations it wants.
    pub default_max_iterations: usize,
    /// Progress events buffered per streaming client before old ones are dropped.
    pub progress_queue_capacity: usize,
    /// How long a finished run waits for a streaming client to take its queued events.
    pub progress_flush_timeout: Duration,
    /// Label forwarded to workers when the task carries none.
    pub scenario: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            llm_url: "http://localhost:8000/chat".to_string(),
            llm_timeout: Duration::from_secs(120),
            worker_urls: vec!["http://agent-b:8102/subtask".to_string()],
            worker_timeout: Duration::from_secs(120),
            max_parallel_workers: 5,
            max_discussion_rounds: 3,
            default_max_iterations: 3,
            progress_queue_capacity: 256,
            progress_flush_timeout: Duration::from_secs(10),
            scenario: "agentic_verse".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Read the process environment. Unset variables keep their defaults.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `LLM_SERVER_URL` | `llm_url` |
    /// | `LLM_TIMEOUT_SECONDS` | `llm_timeout` |
    /// | `AGENT_B_URLS` (comma separated) or `AGENT_B_URL` | `worker_urls` |
    /// | `AGENT_B_TIMEOUT_SECONDS` | `worker_timeout` |
    /// | `MAX_PARALLEL_WORKERS` | `max_parallel_workers` |
    /// | `MAX_DISCUSSION_ROUNDS` | `max_discussion_rounds` |
    /// | `DEFAULT_MAX_ITERATIONS` | `default_max_iterations` |
    /// | `PROGRESS_QUEUE_CAPACITY` | `progress_queue_capacity` |
    /// | `PROGRESS_FLUSH_TIMEOUT_SECONDS` | `progress_flush_timeout` |
    /// | `AGENTVERSE_SCENARIO` | `scenario` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub(crate) fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(url) = get("LLM_SERVER_URL") {
            config.llm_url = url.to_string();
        }
        if let Some(raw) = get("LLM_TIMEOUT_SECONDS") {
            config.llm_timeout = parse_seconds("LLM_TIMEOUT_SECONDS", raw)?;
        }
        if let Some(raw) = get("AGENT_B_URLS").or_else(|| get("AGENT_B_URL")) {
            config.worker_urls = split_urls(raw);
            if config.worker_urls.is_empty() {
                return Err(ConfigError::NoWorkers);
            }
        }
        if let Some(raw) = get("AGENT_B_TIMEOUT_SECONDS") {
            config.worker_timeout = parse_seconds("AGENT_B_TIMEOUT_SECONDS", raw)?;
        }
        if let Some(raw) = get("MAX_PARALLEL_WORKERS") {
            config.max_parallel_workers = parse_positive("MAX_PARALLEL_WORKERS", raw)?;
        }
        if let Some(raw) = get("MAX_DISCUSSION_ROUNDS") {
            config.max_discussion_rounds = parse_positive("MAX_DISCUSSION_ROUNDS", raw)?.min(MAX_DISCUSSION_ROUNDS_CAP);
        }
        if let Some(raw) = get("DEFAULT_MAX_ITERATIONS") {
            config.default_max_iterations = parse_positive("DEFAULT_MAX_ITERATIONS", raw)?.min(MAX_ITERATIONS_CAP);
        }
        if let Some(raw) = get("PROGRESS_QUEUE_CAPACITY") {
            config.progress_queue_capacity = parse_positive("PROGRESS_QUEUE_CAPACITY", raw)?;
        }
        if let Some(raw) = get("PROGRESS_FLUSH_TIMEOUT_SECONDS") {
            config.progress_flush_timeout = parse_seconds("PROGRESS_FLUSH_TIMEOUT_SECONDS", raw)?;
        }
        if let Some(scenario) = get("AGENTVERSE_SCENARIO") {
            config.scenario = scenario.to_string();
        }
        Ok(config)
    }
}

/// Comma-separated endpoint list, blanks removed.
pub fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_seconds(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<f64>() {
        Ok(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs).ok(),
        _ => None,
    }
    .ok_or_else(|| ConfigError::Invalid {
        name,
        expected: "positive number of seconds",
        value: raw.to_string(),
    })
}

fn parse_positive(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "positive integer",
            value: raw.to_string(),
        }),
    }
}
