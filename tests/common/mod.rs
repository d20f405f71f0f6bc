#![allow(dead_code)]

use agentverse::error::{LlmError, WorkerError};
use agentverse::llm_client::{LlmClient, LlmReply, LlmRequest, TokenUsage};
use agentverse::worker_client::{WorkerClient, WorkerReply, WorkerRequest};
use agentverse::OrchestratorConfig;
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const DECISION_TEXT: &str = "DECISION: split the work by role";
pub const FINAL_TEXT: &str = "FINAL ANSWER";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LlmKind {
    Recruitment,
    DecisionSynthesis,
    Evaluation,
    FinalSynthesis,
}

fn classify_prompt(prompt: &str) -> LlmKind {
    if prompt.contains("Decide which experts this task needs") {
        LlmKind::Recruitment
    } else if prompt.contains("Turn the discussion below") {
        LlmKind::DecisionSynthesis
    } else if prompt.contains("Judge whether the team achieved") {
        LlmKind::Evaluation
    } else {
        LlmKind::FinalSynthesis
    }
}

/// Pops scripted replies in order; the last one repeats.
fn next_reply<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

pub struct ScriptedLlm {
    recruitments: Mutex<VecDeque<Result<String, LlmError>>>,
    evaluations: Mutex<VecDeque<String>>,
    synthesis_error: Option<LlmError>,
    pub prompts: Mutex<Vec<(LlmKind, String)>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            recruitments: Mutex::new(VecDeque::new()),
            evaluations: Mutex::new(VecDeque::new()),
            synthesis_error: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn recruit(mut self, reply: String) -> Self {
        self.recruitments.get_mut().unwrap().push_back(Ok(reply));
        self
    }

    pub fn recruit_error(mut self, err: LlmError) -> Self {
        self.recruitments.get_mut().unwrap().push_back(Err(err));
        self
    }

    pub fn evaluate(mut self, reply: String) -> Self {
        self.evaluations.get_mut().unwrap().push_back(reply);
        self
    }

    pub fn fail_final_synthesis(mut self, err: LlmError) -> Self {
        self.synthesis_error = Some(err);
        self
    }

    pub fn count(&self, kind: LlmKind) -> usize {
        self.prompts.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn prompts_of(&self, kind: LlmKind) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmReply, LlmError> {
        let kind = classify_prompt(&request.prompt);
        self.prompts.lock().unwrap().push((kind, request.prompt.clone()));

        let text = match kind {
            LlmKind::Recruitment => next_reply(&self.recruitments)
                .unwrap_or_else(|| Err(LlmError::Transport("no recruitment scripted".into())))?,
            LlmKind::Evaluation => next_reply(&self.evaluations)
                .ok_or_else(|| LlmError::Transport("no evaluation scripted".into()))?,
            LlmKind::DecisionSynthesis => DECISION_TEXT.to_string(),
            LlmKind::FinalSynthesis => match &self.synthesis_error {
                Some(err) => return Err(err.clone()),
                None => FINAL_TEXT.to_string(),
            },
        };

        // The final synthesis reports its accounting only through `meta`.
        if kind == LlmKind::FinalSynthesis {
            return Ok(LlmReply {
                text,
                usage: None,
                meta: Some(json!({"usage": {"prompt_tokens": 30, "completion_tokens": 12}})),
            });
        }
        Ok(LlmReply {
            text,
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            }),
            meta: None,
        })
    }

    fn endpoint(&self) -> &str {
        "mock://llm"
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorkerKind {
    Discussion,
    Solver,
    Reviewer,
    Execution,
}

pub fn classify_subtask(subtask: &str) -> WorkerKind {
    if subtask.contains("executing an assigned subtask") {
        WorkerKind::Execution
    } else if subtask.contains("reviewing a proposed solution") {
        WorkerKind::Reviewer
    } else if subtask.contains("You are the solver") {
        WorkerKind::Solver
    } else {
        WorkerKind::Discussion
    }
}

pub enum Step {
    Reply(String),
    Fail(String),
    /// Never answers; only the worker timeout or cancellation ends the call.
    Hang,
}

pub type Script = Box<dyn Fn(&str, WorkerKind, &WorkerRequest) -> Step + Send + Sync>;

#[derive(Clone, Debug)]
pub struct WorkerCall {
    pub endpoint: String,
    pub kind: WorkerKind,
    pub role: Option<String>,
    pub subtask: String,
}

/// Wakes the waiter when dropped, i.e. when a hanging call is abandoned.
struct NotifyOnDrop(Arc<Notify>);

impl Drop for NotifyOnDrop {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

pub struct ScriptedWorker {
    script: Script,
    pub calls: Mutex<Vec<WorkerCall>>,
    pub execution_started: Arc<Notify>,
    /// Fires when a `Step::Hang` call is dropped before it returns.
    pub hang_abandoned: Arc<Notify>,
}

impl ScriptedWorker {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, WorkerKind, &WorkerRequest) -> Step + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            execution_started: Arc::new(Notify::new()),
            hang_abandoned: Arc::new(Notify::new()),
        }
    }

    /// Agrees immediately in every discussion and returns `done by <endpoint>` on execution.
    pub fn agreeable() -> Self {
        Self::new(|endpoint, kind, _| match kind {
            WorkerKind::Discussion => Step::Reply("Agreed. [CONSENSUS]".into()),
            WorkerKind::Reviewer => Step::Reply("Looks right. [APPROVED]".into()),
            WorkerKind::Solver => Step::Reply("proposal".into()),
            WorkerKind::Execution => Step::Reply(format!("done by {}", endpoint)),
        })
    }

    pub fn calls_of(&self, kind: WorkerKind) -> Vec<WorkerCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WorkerClient for ScriptedWorker {
    async fn dispatch(&self, endpoint: &str, request: &WorkerRequest) -> Result<WorkerReply, WorkerError> {
        let kind = classify_subtask(&request.subtask);
        self.calls.lock().unwrap().push(WorkerCall {
            endpoint: endpoint.to_string(),
            kind,
            role: request.role.clone(),
            subtask: request.subtask.clone(),
        });
        if kind == WorkerKind::Execution {
            self.execution_started.notify_one();
        }

        match (self.script)(endpoint, kind, request) {
            Step::Reply(text) => Ok(WorkerReply::new(text)),
            Step::Fail(message) => Err(WorkerError::Transport {
                endpoint: endpoint.to_string(),
                message,
            }),
            Step::Hang => {
                let _abandoned = NotifyOnDrop(self.hang_abandoned.clone());
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(WorkerError::Transport {
                    endpoint: endpoint.to_string(),
                    message: "hung".into(),
                })
            }
        }
    }
}

pub fn config(workers: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        llm_url: "mock://llm".into(),
        worker_urls: (1..=workers).map(|i| format!("http://w{}", i)).collect(),
        worker_timeout: Duration::from_millis(300),
        llm_timeout: Duration::from_secs(5),
        ..OrchestratorConfig::default()
    }
}

pub fn recruitment_json(roles: &[&str], structure: &str) -> String {
    let experts: Vec<_> = roles
        .iter()
        .map(|r| json!({"role": r, "responsibilities": format!("{} things", r), "contract": "be useful"}))
        .collect();
    json!({
        "experts": experts,
        "communication_structure": structure,
        "execution_order": roles,
        "reasoning": "scripted roster"
    })
    .to_string()
}

pub fn evaluation_json(score: u8, goal_achieved: bool, should_iterate: bool, feedback: &str) -> String {
    json!({
        "goal_achieved": goal_achieved,
        "score": score,
        "criteria": {"completeness": score, "correctness": score, "clarity": score, "relevance": score, "actionability": score},
        "rationale": "scripted",
        "feedback": feedback,
        "missing_aspects": [],
        "should_iterate": should_iterate
    })
    .to_string()
}
