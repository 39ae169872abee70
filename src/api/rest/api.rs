use anyhow::Result;
use std::fs;
use std::process;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::rest::create_router;
use crate::shared::config::AgentConfig;
use crate::shared::AppState;

pub async fn run_rest_server(config: AgentConfig) -> Result<()> {
    // Write PID file for process management
    let pid = process::id();
    let pid_file = "/tmp/autoagent.pid";

    if let Err(e) = fs::write(pid_file, pid.to_string()) {
        warn!("Could not write PID file: {}", e);
    }

    // Clean up the PID file on exit
    let pid_file_cleanup = pid_file.to_string();
    ctrlc::set_handler(move || {
        info!("Shutting down Automation Agent...");
        let _ = fs::remove_file(&pid_file_cleanup);
        std::process::exit(0);
    })?;

    info!("Starting Automation Agent (PID {})", pid);
    info!("Data root: {}", config.data_root.display());
    if config.llm.api_token.is_none() {
        warn!("AIPROXY_TOKEN not set - LLM-backed tasks will fail until it is configured");
    }

    if let Err(e) = fs::create_dir_all(&config.data_root) {
        warn!(
            "Could not create data root {}: {}",
            config.data_root.display(),
            e
        );
    }

    let host = config.host.clone();
    let port = config.port;
    let state = Arc::new(AppState::new(config)?);
    let app = create_router(state);

    let bind_addr = format!("{host}:{port}");
    info!("Binding to: {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Automation Agent listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
