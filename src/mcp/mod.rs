use axum::Router;
use tracing::{error, info};

use crate::mcp::routes::create_router;
use crate::mcp::state::McpState;
use crate::shared::config::AppConfig;
use crate::shared::logging;
use crate::{Args, Transport};

pub mod backend;
pub mod backends;
pub mod cache;
pub mod error;
pub mod handlers;
pub mod loader;
pub mod models;
pub mod records;
pub mod routes;
pub mod script;
pub mod state;
pub mod stdio;
pub mod toolkit;
pub mod tools;

pub async fn run_server(args: Args) -> anyhow::Result<()> {
    let (mut config, config_path) = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = args.log_dir {
        config.logging.dir = dir;
    }

    let _ = logging::init_service_logging(&config.logging.dir, "apple_tools_mcp");

    info!("Starting Apple tools MCP service...");
    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found; using defaults"),
    }

    let state = McpState::new(config);

    match args.transport {
        Transport::Stdio => stdio::serve(state).await,
        Transport::Http => serve_http(state).await,
    }
}

async fn serve_http(state: McpState) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app: Router = create_router(state);

    info!("Binding MCP service to {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("MCP service ready at http://{}/api/v0/mcp", bind_addr);

    ctrlc::set_handler(move || {
        info!("Shutting down Apple tools MCP...");
        std::process::exit(0);
    })?;

    if let Err(e) = axum::serve(listener, app).await {
        error!("MCP server error: {}", e);
        return Err(anyhow::anyhow!(e));
    }

    Ok(())
}
