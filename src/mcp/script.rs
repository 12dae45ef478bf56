use tokio::process::Command;
use tracing::{debug, warn};

use crate::mcp::error::{BackendError, BackendResult};

const MAX_ERROR_CHARS: usize = 2_048;

#[derive(Debug, Clone, Copy)]
pub enum Language {
    AppleScript,
    JavaScript,
}

impl Language {
    fn flag(&self) -> &'static str {
        match self {
            Language::AppleScript => "AppleScript",
            Language::JavaScript => "JavaScript",
        }
    }
}

pub async fn run_applescript(script: &str) -> BackendResult<String> {
    run(Language::AppleScript, script).await
}

pub async fn run_jxa(script: &str) -> BackendResult<String> {
    run(Language::JavaScript, script).await
}

/// Run one script through `osascript` and return trimmed stdout.
pub async fn run(language: Language, script: &str) -> BackendResult<String> {
    debug!("Running {} ({} chars)", language.flag(), script.len());
    let output = Command::new("osascript")
        .args(["-l", language.flag(), "-e", script])
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = clip(&stderr);
    warn!("osascript exited with {}: {}", output.status, message);
    Err(BackendError::Script(message))
}

/// Probe that the target application accepts Apple Events from us. This is
/// the call that can block on the first-run permission prompt.
pub async fn probe(app: &'static str, script: &str) -> BackendResult<()> {
    match run_applescript(script).await {
        Ok(_) => Ok(()),
        Err(BackendError::Script(message)) if is_permission_error(&message) => {
            Err(BackendError::AccessDenied { app, message })
        }
        Err(BackendError::Script(message)) => Err(BackendError::Script(format!(
            "{} is not available: {}",
            app, message
        ))),
        Err(other) => Err(other),
    }
}

fn is_permission_error(stderr: &str) -> bool {
    // -1743: not authorized to send Apple events, -1744: user consent pending
    stderr.contains("-1743") || stderr.contains("-1744") || stderr.contains("not allowed")
}

/// Quote `value` as an AppleScript string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_ERROR_CHARS).collect();
    clipped.push_str("...");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_breakouts() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn test_permission_errors_are_recognised() {
        assert!(is_permission_error(
            "execution error: Not authorized to send Apple events to Mail. (-1743)"
        ));
        assert!(!is_permission_error("syntax error: Expected end of line"));
    }

    #[test]
    fn test_clip_limits_length() {
        let long = "x".repeat(MAX_ERROR_CHARS + 10);
        assert_eq!(clip(&long).chars().count(), MAX_ERROR_CHARS + 3);
        assert_eq!(clip("short"), "short");
    }
}
