use crate::mcp::backends::split_lines;
use crate::mcp::error::{BackendError, BackendResult};
use crate::mcp::records::{decode, identified_by, DecodedRecord};
use crate::mcp::script::{self, quote};
use crate::shared::config::MailConfig;

/// Fields that mark a decoded record as an email rather than script noise.
const EMAIL_FIELDS: &[&str] = &["subject", "sender"];

/// Upper bound on body text the script sends back per message.
const SCRIPT_CONTENT_CHARS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub mailbox: String,
    pub account: String,
    pub preview: String,
}

#[derive(Debug, Clone, Default)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

/// Mail.app access. Message queries print pseudo-records which are decoded
/// with `records::decode`.
pub struct Mail {
    config: MailConfig,
}

/// Which mailboxes a message query walks.
enum Scope<'a> {
    Inbox,
    Account(&'a str),
    Mailbox(&'a str),
    AccountMailbox(&'a str, &'a str),
}

impl Scope<'_> {
    fn from_args<'a>(account: Option<&'a str>, mailbox: Option<&'a str>) -> Scope<'a> {
        match (account, mailbox) {
            (Some(a), Some(m)) => Scope::AccountMailbox(a, m),
            (Some(a), None) => Scope::Account(a),
            (None, Some(m)) => Scope::Mailbox(m),
            (None, None) => Scope::Inbox,
        }
    }

    fn expression(&self) -> String {
        match self {
            Scope::Inbox => "{inbox}".to_string(),
            Scope::Account(a) => format!("every mailbox of account {}", quote(a)),
            Scope::Mailbox(m) => format!("{{mailbox {}}}", quote(m)),
            Scope::AccountMailbox(a, m) => {
                format!("{{mailbox {} of account {}}}", quote(m), quote(a))
            }
        }
    }
}

impl Mail {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub async fn connect(config: MailConfig) -> BackendResult<Self> {
        script::probe("Mail", r#"tell application "Mail" to count of accounts"#).await?;
        Ok(Self::new(config))
    }

    pub async fn accounts(&self) -> BackendResult<Vec<String>> {
        let output = script::run_applescript(
            r#"tell application "Mail"
    set out to ""
    repeat with a in every account
        set out to out & (name of a) & linefeed
    end repeat
    return out
end tell"#,
        )
        .await?;
        Ok(first_column(&output))
    }

    pub async fn mailboxes(&self, account: Option<&str>) -> BackendResult<Vec<String>> {
        let selection = match account {
            Some(a) => format!("every mailbox of account {}", quote(a)),
            None => "every mailbox".to_string(),
        };
        let output = script::run_applescript(&format!(
            r#"tell application "Mail"
    set out to ""
    repeat with mb in ({selection})
        set out to out & (name of mb) & linefeed
    end repeat
    return out
end tell"#
        ))
        .await?;
        Ok(first_column(&output))
    }

    pub async fn unread(
        &self,
        account: Option<&str>,
        mailbox: Option<&str>,
        limit: usize,
    ) -> BackendResult<Vec<Email>> {
        let scope = Scope::from_args(account, mailbox);
        self.query(&scope, "whose read status is false", limit).await
    }

    pub async fn search(
        &self,
        term: &str,
        account: Option<&str>,
        limit: usize,
    ) -> BackendResult<Vec<Email>> {
        if term.trim().is_empty() {
            return Err(BackendError::Rejected("search term must not be empty".to_string()));
        }
        let scope = Scope::from_args(account, None);
        let filter = format!(
            "whose (subject contains {q} or sender contains {q})",
            q = quote(term)
        );
        self.query(&scope, &filter, limit).await
    }

    pub async fn latest(&self, account: &str, limit: usize) -> BackendResult<Vec<Email>> {
        self.query(&Scope::AccountMailbox(account, "INBOX"), "", limit)
            .await
    }

    pub async fn send(&self, email: &OutgoingEmail) -> BackendResult<()> {
        if email.to.trim().is_empty() {
            return Err(BackendError::Rejected("recipient must not be empty".to_string()));
        }
        let mut recipients = recipient_lines("to recipient", &email.to);
        if let Some(cc) = email.cc.as_deref() {
            recipients.push_str(&recipient_lines("cc recipient", cc));
        }
        if let Some(bcc) = email.bcc.as_deref() {
            recipients.push_str(&recipient_lines("bcc recipient", bcc));
        }
        let script = format!(
            r#"tell application "Mail"
    set msg to make new outgoing message with properties {{subject:{subject}, content:{body}, visible:false}}
    tell msg
{recipients}    end tell
    send msg
end tell"#,
            subject = quote(&email.subject),
            body = quote(&email.body),
        );
        script::run_applescript(&script).await.map(|_| ())
    }

    async fn query(&self, scope: &Scope<'_>, filter: &str, limit: usize) -> BackendResult<Vec<Email>> {
        let output = script::run_applescript(&message_script(scope, filter, limit)).await?;
        Ok(decode(&output, identified_by(EMAIL_FIELDS))
            .map(|record| self.to_email(&record))
            .take(limit)
            .collect())
    }

    fn to_email(&self, record: &DecodedRecord) -> Email {
        Email {
            subject: record.get_or("subject", "No subject").to_string(),
            sender: record.get_or("sender", "Unknown sender").to_string(),
            date: record.get_or("date", "").to_string(),
            mailbox: record.get_or("mailbox", "").to_string(),
            account: record.get_or("account", "").to_string(),
            preview: truncate(record.get_or("content", ""), self.config.preview_chars),
        }
    }
}

/// AppleScript that prints one `{key:value, ...}` group per message. Values
/// are scrubbed of the characters the record format uses as delimiters.
fn message_script(scope: &Scope<'_>, filter: &str, limit: usize) -> String {
    format!(
        r#"on clean(t)
    set AppleScript's text item delimiters to {{",", "{{", "}}", return, linefeed}}
    set parts to text items of (t as text)
    set AppleScript's text item delimiters to " "
    set t to parts as text
    set AppleScript's text item delimiters to ""
    return t
end clean

tell application "Mail"
    set out to ""
    set n to 0
    repeat with mb in ({scope})
        if n ≥ {limit} then exit repeat
        set msgs to (messages of mb {filter})
        repeat with m in msgs
            if n ≥ {limit} then exit repeat
            set body to ""
            try
                set body to content of m
                if length of body > {SCRIPT_CONTENT_CHARS} then set body to text 1 thru {SCRIPT_CONTENT_CHARS} of body
            end try
            set out to out & "{{subject:" & my clean(subject of m) & ", sender:" & my clean(sender of m) & ", date:" & my clean((date received of m) as string) & ", mailbox:" & my clean(name of mb) & ", account:" & my clean(name of account of mb) & ", content:" & my clean(body) & "}}" & linefeed
            set n to n + 1
        end repeat
    end repeat
    return out
end tell"#,
        scope = scope.expression(),
    )
}

fn recipient_lines(kind: &str, addresses: &str) -> String {
    addresses
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| {
            format!(
                "        make new {kind} at end of {kind}s with properties {{address:{}}}\n",
                quote(a)
            )
        })
        .collect()
}

fn first_column(output: &str) -> Vec<String> {
    split_lines(output)
        .into_iter()
        .filter_map(|row| row.first().map(|s| s.to_string()))
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_map_to_emails() {
        let mail = Mail::new(MailConfig { preview_chars: 5 });
        let output = "{subject:Hello, sender:a@b.com, date:Monday 1 January 2024 at 10:00:00, mailbox:INBOX, account:Work, content:Long body text}\n\
                      {foo:bar}\n\
                      {sender:c@d.com}";
        let emails: Vec<Email> = decode(output, identified_by(EMAIL_FIELDS))
            .map(|r| mail.to_email(&r))
            .collect();

        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].subject, "Hello");
        assert_eq!(emails[0].preview, "Long ...");
        assert_eq!(emails[1].subject, "No subject");
        assert_eq!(emails[1].sender, "c@d.com");
    }

    #[test]
    fn test_scope_expressions_quote_names() {
        assert_eq!(Scope::from_args(None, None).expression(), "{inbox}");
        assert_eq!(
            Scope::from_args(Some("Work"), Some("Sent")).expression(),
            r#"{mailbox "Sent" of account "Work"}"#
        );
        assert_eq!(
            Scope::from_args(Some("Work"), None).expression(),
            r#"every mailbox of account "Work""#
        );
    }

    #[test]
    fn test_recipient_lines_split_on_commas() {
        let lines = recipient_lines("cc recipient", "a@b.com, ,c@d.com");
        assert_eq!(lines.lines().count(), 2);
        assert!(lines.contains(r#"{address:"c@d.com"}"#));
    }

    #[test]
    fn test_message_script_embeds_limit_and_filter() {
        let script = message_script(&Scope::Inbox, "whose read status is false", 3);
        assert!(script.contains("if n ≥ 3 then exit repeat"));
        assert!(script.contains("messages of mb whose read status is false"));
        assert!(script.contains("\"{subject:\""));
    }
}
