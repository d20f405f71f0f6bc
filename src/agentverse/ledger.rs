//! The request ledger: every completed model exchange of a run, in completion order.
//!
//! Entries are only appended by the [`RunRecorder`](crate::recorder::RunRecorder) actor,
//! which is what makes the sequence numbers unique and strictly increasing even when
//! several expert calls finish at the same moment.

use crate::agentverse::llm_client::TokenUsage;
use crate::agentverse::model::Stage;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A finished exchange, before it has been given a sequence number.
#[derive(Clone, Debug, Serialize)]
pub struct Exchange {
    pub iteration: usize,
    pub stage: Stage,
    /// Short description of the call, e.g. `horizontal_round_2`.
    pub label: String,
    /// `orchestrator` or `expert-<n>`.
    pub source: String,
    pub role: Option<String>,
    pub prompt: String,
    pub response: String,
    pub endpoint: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub request_id: String,
    pub round: Option<usize>,
    pub usage: Option<TokenUsage>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LedgerEntry {
    pub seq: u64,
    #[serde(flatten)]
    pub exchange: Exchange,
}

/// Append-only list of entries. Not shared; owned by the recorder task.
#[derive(Debug)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    next_seq: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 1,
        }
    }

    pub fn append(&mut self, exchange: Exchange) -> &LedgerEntry {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(LedgerEntry { seq, exchange });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn sample_exchange(label: &str) -> Exchange {
    Exchange {
        iteration: 1,
        stage: Stage::Decision,
        label: label.to_string(),
        source: "orchestrator".to_string(),
        role: None,
        prompt: "p".to_string(),
        response: "r".to_string(),
        endpoint: "http://llm".to_string(),
        started_at: Utc::now(),
        duration_seconds: 0.1,
        request_id: "abcd1234".to_string(),
        round: None,
        usage: None,
    }
}
