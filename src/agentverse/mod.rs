// src/agentverse/mod.rs

pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod llm_client;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod recorder;
pub mod reply;
pub mod roles;
pub mod server;
pub mod stages;
pub mod vote;
pub mod worker_client;

// Let callers write agentverse::Orchestrator instead of agentverse::orchestrator::Orchestrator
pub use orchestrator::Orchestrator;
