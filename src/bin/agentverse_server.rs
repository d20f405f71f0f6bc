//! # agentverse-server
//!
//! Runs the orchestrator behind its HTTP surface. Configuration comes from the
//! environment (see [`OrchestratorConfig::from_env`]); flags given here win over it.
//!
//! ```text
//! RUST_LOG=info agentverse-server --port 8101 \
//!     --llm-url http://localhost:8000/chat \
//!     --worker-url http://w1:8102/subtask --worker-url http://w2:8102/subtask
//! ```

use agentverse::config::split_urls;
use agentverse::{Orchestrator, OrchestratorConfig};
use clap::Parser;
use log::{error, info};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// AgentVerse orchestrator HTTP server
#[derive(Parser, Debug)]
#[command(name = "agentverse-server", version, about, long_about = None)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "AGENT_A_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind
    #[arg(long, env = "AGENT_A_PORT", default_value = "8101")]
    port: u16,

    /// Completion endpoint of the model backend
    #[arg(long, value_name = "URL")]
    llm_url: Option<String>,

    /// Worker endpoint; repeat or comma-separate for a pool
    #[arg(long = "worker-url", value_name = "URL")]
    worker_urls: Vec<String>,

    /// Per-call worker timeout in seconds
    #[arg(long, value_name = "SECS")]
    worker_timeout: Option<u64>,

    /// Maximum experts per iteration and concurrent worker calls
    #[arg(long)]
    max_parallel_workers: Option<usize>,
}

impl Cli {
    fn apply(self, mut config: OrchestratorConfig) -> OrchestratorConfig {
        if let Some(url) = self.llm_url {
            config.llm_url = url;
        }
        let workers: Vec<String> = self.worker_urls.iter().flat_map(|raw| split_urls(raw)).collect();
        if !workers.is_empty() {
            config.worker_urls = workers;
        }
        if let Some(secs) = self.worker_timeout {
            config.worker_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(n) = self.max_parallel_workers {
            config.max_parallel_workers = n.max(1);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    agentverse::init_logger();

    let cli = Cli::parse();
    let bind = format!("{}:{}", cli.host, cli.port);
    let config = cli.apply(OrchestratorConfig::from_env()?);

    info!("agentverse-server: llm={} scenario={}", config.llm_url, config.scenario);

    let orchestrator = Arc::new(Orchestrator::from_config(config)?);
    let listener = TcpListener::bind(&bind).await?;

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("agentverse-server: could not listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
        info!("agentverse-server: shutting down");
    };

    agentverse::server::serve(listener, orchestrator, shutdown).await?;
    Ok(())
}
