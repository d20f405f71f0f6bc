//! HTTP implementations of [`LlmClient`](crate::llm_client::LlmClient) and
//! [`WorkerClient`](crate::worker_client::WorkerClient).
//!
//! Both share pooled connections from [`http_pool`] and stamp every request with the
//! short id produced by [`new_request_id`].

pub mod http_llm;
pub mod http_pool;
pub mod http_worker;

/// Eight hex characters, enough to correlate a ledger entry with backend logs.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
