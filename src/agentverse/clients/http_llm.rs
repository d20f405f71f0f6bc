//! [`LlmClient`] for the plain-JSON completion backend.
//!
//! Wire contract: `POST <url>` with `{"prompt", "system_prompt"?, "max_tokens"?}` and an
//! `X-Request-ID` header; the reply is `{"output": "...", "meta": {...}?}`.

use crate::agentverse::clients::http_pool::get_http_client;
use crate::agentverse::error::LlmError;
use crate::agentverse::llm_client::{LlmClient, LlmReply, LlmRequest, TokenUsage};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct CompletionBody<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct CompletionReply {
    #[serde(default)]
    output: String,
    #[serde(default)]
    meta: Option<serde_json::Value>,
}

pub struct HttpLlmClient {
    url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into();
        let http = get_http_client(&url);
        Self { url, timeout, http }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmReply, LlmError> {
        let body = CompletionBody {
            prompt: &request.prompt,
            system_prompt: request.system_prompt.as_deref(),
            max_tokens: request.max_tokens,
        };

        debug!(
            "agentverse::clients::http_llm: req={} POST {} ({} prompt chars)",
            request.request_id,
            self.url,
            request.prompt.len()
        );

        let response = self
            .http
            .post(&self.url)
            .header("X-Request-ID", &request.request_id)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: CompletionReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout)
            } else {
                LlmError::Decode(e.to_string())
            }
        })?;

        let usage = reply.meta.as_ref().and_then(TokenUsage::from_meta);
        Ok(LlmReply {
            text: reply.output,
            usage,
            meta: reply.meta,
        })
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
