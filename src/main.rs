use anyhow::Result;
use clap::Parser;

mod api;
mod shared;
mod tasks;

#[derive(Parser)]
#[command(name = "autoagent")]
#[command(about = "Automation Agent - task-dispatch HTTP service")]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, env = "AGENT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "AGENT_PORT", default_value_t = 8000)]
    port: u16,

    /// Root directory for all file operations; nothing outside it is touched
    #[arg(long, env = "AGENT_DATA_ROOT", default_value = "/data")]
    data_root: String,

    /// Directory for service logs
    #[arg(long, env = "AGENT_LOG_DIR", default_value = "/app/logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _ = shared::logging::init_service_logging(&args.log_dir, "autoagent");

    let config = shared::config::AgentConfig::resolve(args.host, args.port, &args.data_root)?;

    api::rest::api::run_rest_server(config).await
}
