use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::mcp::handlers::handle_message;
use crate::mcp::state::McpState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Serve line-delimited JSON-RPC on stdin/stdout until stdin closes.
///
/// Every request runs as its own task so a hung backend only blocks the
/// call that hit it. Responses are funnelled through one writer task.
pub async fn serve(state: McpState) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if let Err(e) = write_line(&mut stdout, &line).await {
                error!("Failed to write response: {}", e);
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Serving MCP over stdio");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let state = state.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let Some(response) = handle_message(&state, &line).await else {
                return;
            };
            match serde_json::to_string(&response) {
                Ok(text) => {
                    let _ = tx.send(text);
                }
                Err(e) => warn!("Failed to encode response: {}", e),
            }
        });
    }

    info!("stdin closed; shutting down");
    drop(tx);
    // Give in-flight requests a moment to flush; a hung backend call must not
    // keep the process alive.
    if tokio::time::timeout(SHUTDOWN_GRACE, writer).await.is_err() {
        warn!("Requests still running after {:?}; exiting anyway", SHUTDOWN_GRACE);
    }
    Ok(())
}

async fn write_line(stdout: &mut tokio::io::Stdout, line: &str) -> std::io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
