use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{error, info};

use crate::mcp::error::{BackendError, BackendResult};
use crate::mcp::script::{self, quote};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub is_from_me: i64,
}

#[derive(Debug, Clone)]
pub struct ScheduledMessage {
    pub id: u64,
    pub phone_number: String,
    pub send_at: DateTime<Local>,
}

/// Messages.app access. Sending goes through AppleScript; history is read
/// from the local `chat.db` with the `sqlite3` CLI.
pub struct Messages {
    next_schedule_id: AtomicU64,
}

impl Messages {
    pub fn new() -> Self {
        Self {
            next_schedule_id: AtomicU64::new(1),
        }
    }

    pub async fn connect() -> BackendResult<Self> {
        script::probe("Messages", r#"tell application "Messages" to count of accounts"#).await?;
        Ok(Self::new())
    }

    pub async fn send(&self, phone_number: &str, message: &str) -> BackendResult<()> {
        send_message(phone_number, message).await
    }

    pub async fn read(&self, phone_number: &str, limit: usize) -> BackendResult<Vec<Message>> {
        let handles = phone_variants(phone_number)
            .iter()
            .map(|h| sql_string(h))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "{MESSAGE_SELECT} WHERE h.id IN ({handles}) AND m.text IS NOT NULL \
             ORDER BY m.date DESC LIMIT {limit};"
        );
        query_chat_db(&sql).await
    }

    pub async fn unread(&self, limit: usize) -> BackendResult<Vec<Message>> {
        let sql = format!(
            "{MESSAGE_SELECT} WHERE m.is_read = 0 AND m.is_from_me = 0 AND m.text IS NOT NULL \
             ORDER BY m.date DESC LIMIT {limit};"
        );
        query_chat_db(&sql).await
    }

    /// Send `message` once at `send_at`. The delayed send runs as its own
    /// task; its outcome is only logged.
    pub fn schedule(
        &self,
        phone_number: &str,
        message: &str,
        send_at: DateTime<Local>,
    ) -> BackendResult<ScheduledMessage> {
        let delay = (send_at - Local::now())
            .to_std()
            .map_err(|_| BackendError::Rejected("scheduled time must be in the future".to_string()))?;

        let id = self.next_schedule_id.fetch_add(1, Ordering::SeqCst);
        let phone = phone_number.to_string();
        let text = message.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match send_message(&phone, &text).await {
                Ok(()) => info!("Scheduled message {} sent", id),
                Err(e) => error!("Scheduled message {} failed: {}", id, e),
            }
        });

        Ok(ScheduledMessage {
            id,
            phone_number: phone_number.to_string(),
            send_at,
        })
    }
}

const MESSAGE_SELECT: &str = "SELECT m.text AS content, \
    datetime(m.date / 1000000000 + strftime('%s', '2001-01-01'), 'unixepoch', 'localtime') AS date, \
    h.id AS sender, m.is_from_me AS is_from_me \
    FROM message m JOIN handle h ON m.handle_id = h.ROWID";

async fn send_message(phone_number: &str, message: &str) -> BackendResult<()> {
    let script = format!(
        r#"tell application "Messages"
    set targetService to 1st account whose service type = iMessage
    set targetBuddy to participant {phone} of targetService
    send {body} to targetBuddy
end tell"#,
        phone = quote(phone_number),
        body = quote(message),
    );
    script::run_applescript(&script).await.map(|_| ())
}

async fn query_chat_db(sql: &str) -> BackendResult<Vec<Message>> {
    let db = chat_db_path()?;
    let output = Command::new("sqlite3")
        .arg("-json")
        .arg(&db)
        .arg(sql)
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("authorization denied") || stderr.contains("unable to open") {
            return Err(BackendError::AccessDenied {
                app: "Messages",
                message: "grant Full Disk Access to read message history".to_string(),
            });
        }
        return Err(BackendError::Script(stderr.trim().to_string()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    crate::mcp::backends::parse_json(&stdout)
}

fn chat_db_path() -> BackendResult<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join("Library/Messages/chat.db"))
        .ok_or_else(|| BackendError::Rejected("HOME is not set".to_string()))
}

/// Handle ids the same number may be stored under.
fn phone_variants(phone_number: &str) -> Vec<String> {
    let trimmed = phone_number.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    let mut variants = vec![trimmed.to_string()];
    if !digits.is_empty() {
        variants.push(digits.clone());
        variants.push(format!("+{digits}"));
        if digits.len() == 10 {
            variants.push(format!("+1{digits}"));
        }
    }
    variants.dedup();
    variants
}

fn sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_variants_cover_country_code() {
        let variants = phone_variants("(555) 123-4567");
        assert!(variants.contains(&"5551234567".to_string()));
        assert!(variants.contains(&"+15551234567".to_string()));
    }

    #[test]
    fn test_sql_string_escapes_quotes() {
        assert_eq!(sql_string("o'neil"), "'o''neil'");
    }

    #[tokio::test]
    async fn test_schedule_rejects_past_time() {
        let messages = Messages::new();
        let past = Local::now() - chrono::Duration::minutes(5);
        let result = messages.schedule("+15551234567", "hi", past);
        assert!(matches!(result, Err(BackendError::Rejected(_))));
    }

    #[test]
    fn test_message_rows_deserialize() {
        let rows: Vec<Message> = serde_json::from_str(
            r#"[{"content":"hey","date":"2024-01-01 10:00:00","sender":"+1555","is_from_me":0}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].content.as_deref(), Some("hey"));
        assert_eq!(rows[0].is_from_me, 0);
    }
}
