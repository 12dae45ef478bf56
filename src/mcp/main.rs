use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

#[path = "mod.rs"]
mod mcp;
#[path = "../shared/mod.rs"]
mod shared;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Parser, Debug)]
#[command(name = "apple-tools-mcp")]
#[command(about = "MCP server exposing Contacts, Notes, Messages, Mail, Reminders, Calendar, Maps and web search")]
pub struct Args {
    /// Path to a JSON config file
    #[arg(long, env = "APPLE_TOOLS_CONFIG")]
    config: Option<PathBuf>,

    /// Transport to serve on
    #[arg(long, env = "APPLE_TOOLS_TRANSPORT", value_enum, default_value = "stdio")]
    transport: Transport,

    /// HTTP bind host (overrides config)
    #[arg(long, env = "APPLE_TOOLS_HOST")]
    host: Option<String>,

    /// HTTP bind port (overrides config)
    #[arg(long, env = "APPLE_TOOLS_PORT")]
    port: Option<u16>,

    /// Log directory (overrides config)
    #[arg(long, env = "APPLE_TOOLS_LOG_DIR")]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    mcp::run_server(args).await
}
