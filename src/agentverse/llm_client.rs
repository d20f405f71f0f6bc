//! The orchestrator's view of the language-model backend.
//!
//! An [`LlmClient`] performs exactly one prompt/response exchange per call. It keeps no
//! conversation state: every stage builds its full prompt up front, so the trait stays
//! small enough to mock in a few lines.
//!
//! ```rust
//! use agentverse::llm_client::{LlmClient, LlmReply, LlmRequest};
//! use agentverse::error::LlmError;
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl LlmClient for Echo {
//!     async fn complete(&self, request: &LlmRequest) -> Result<LlmReply, LlmError> {
//!         Ok(LlmReply::text(request.prompt.clone()))
//!     }
//!
//!     fn endpoint(&self) -> &str {
//!         "echo://"
//!     }
//! }
//! ```

use crate::agentverse::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Pull usage counters out of an opaque backend `meta` object, if it reports any.
    ///
    /// Accepts either `prompt_tokens`/`completion_tokens` or `input_tokens`/`output_tokens`,
    /// at the top level or nested under `usage`.
    pub fn from_meta(meta: &serde_json::Value) -> Option<Self> {
        let scope = meta.get("usage").unwrap_or(meta);
        let read = |a: &str, b: &str| {
            scope
                .get(a)
                .or_else(|| scope.get(b))
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
        };
        let input = read("prompt_tokens", "input_tokens");
        let output = read("completion_tokens", "output_tokens");
        if input.is_none() && output.is_none() {
            return None;
        }
        let input_tokens = input.unwrap_or(0);
        let output_tokens = output.unwrap_or(0);
        let total_tokens = read("total_tokens", "total_tokens").unwrap_or(input_tokens + output_tokens);
        Some(TokenUsage {
            input_tokens,
            output_tokens,
            total_tokens,
        })
    }
}

/// A single prompt sent to the backend.
#[derive(Clone, Debug)]
pub struct LlmRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// Upper bound on generated tokens; `None` lets the backend decide.
    pub max_tokens: Option<u32>,
    /// Short id forwarded as `X-Request-ID` and recorded in the ledger.
    pub request_id: String,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            max_tokens: None,
            request_id: request_id.into(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Generated text plus whatever accounting the backend reported.
#[derive(Clone, Debug, Default)]
pub struct LlmReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub meta: Option<serde_json::Value>,
}

impl LlmReply {
    /// A reply with no usage or metadata attached.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            meta: None,
        }
    }

    /// `usage` when the client filled it in, otherwise whatever `meta` reports.
    pub fn reported_usage(&self) -> Option<TokenUsage> {
        self.usage
            .clone()
            .or_else(|| self.meta.as_ref().and_then(TokenUsage::from_meta))
    }
}

/// One prompt/response exchange against the inference backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmReply, LlmError>;

    /// Where requests go, for the ledger.
    fn endpoint(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_is_read_from_flat_or_nested_meta() {
        let flat = TokenUsage::from_meta(&json!({"prompt_tokens": 12, "completion_tokens": 30}));
        assert_eq!(
            flat,
            Some(TokenUsage {
                input_tokens: 12,
                output_tokens: 30,
                total_tokens: 42
            })
        );

        let nested = TokenUsage::from_meta(&json!({"usage": {"input_tokens": 5, "output_tokens": 1, "total_tokens": 7}}));
        assert_eq!(nested.map(|u| u.total_tokens), Some(7));

        assert_eq!(TokenUsage::from_meta(&json!({"model": "llama"})), None);
    }
}
