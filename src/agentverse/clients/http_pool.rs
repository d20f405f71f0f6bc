//! Shared `reqwest::Client` instances, one per base URL.
//!
//! Every run talks to the same LLM backend and the same handful of worker endpoints, so
//! keeping one pooled client per URL lets concurrent runs reuse TCP connections instead
//! of reconnecting for each subtask.
//!
//! Clients are built with:
//! - `pool_idle_timeout`: idle connections kept for 90 seconds
//! - `pool_max_idle_per_host`: up to 10 idle connections per host
//! - `tcp_keepalive`: probes every 60 seconds
//!
//! Per-call timeouts are set on each request, not on the shared client.

use lazy_static::lazy_static;
use log::warn;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    static ref HTTP_CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> = Mutex::new(HashMap::new());
}

/// Get or create the shared client for `base_url`.
pub fn get_http_client(base_url: &str) -> reqwest::Client {
    let mut pool = HTTP_CLIENT_POOL
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(client) = pool.get(base_url) {
        return client.clone();
    }

    let client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()
        .unwrap_or_else(|err| {
            warn!("agentverse::clients::http_pool: falling back to a default client for {}: {}", base_url, err);
            reqwest::Client::new()
        });

    pool.insert(base_url.to_string(), client.clone());
    client
}
