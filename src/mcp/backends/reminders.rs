use serde::Deserialize;

use crate::mcp::backends::{js_literal, parse_json};
use crate::mcp::error::{BackendError, BackendResult};
use crate::mcp::script;

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderList {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub list_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewReminder {
    pub name: String,
    pub list_name: Option<String>,
    pub notes: Option<String>,
    /// ISO 8601, passed straight to `new Date(...)`.
    pub due_date: Option<String>,
}

/// JXA snippet mapping a reminder object to the `Reminder` JSON shape.
const REMINDER_JSON: &str = "r => ({ id: r.id(), name: r.name(), body: r.body(), completed: r.completed(), \
     dueDate: r.dueDate() ? r.dueDate().toISOString() : null, listName: r.container().name() })";

/// Reminders.app access.
pub struct Reminders;

impl Reminders {
    pub fn new() -> Self {
        Self
    }

    pub async fn connect() -> BackendResult<Self> {
        script::probe("Reminders", r#"tell application "Reminders" to count every list"#).await?;
        Ok(Self::new())
    }

    pub async fn lists(&self) -> BackendResult<Vec<ReminderList>> {
        let output = script::run_jxa(
            "const R = Application('Reminders');\n\
             JSON.stringify(R.lists().map(l => ({ name: l.name(), id: l.id() })));",
        )
        .await?;
        parse_json(&output)
    }

    /// Incomplete reminders across every list.
    pub async fn open_items(&self) -> BackendResult<Vec<Reminder>> {
        let script = format!(
            "const R = Application('Reminders');\n\
             JSON.stringify(R.reminders.whose({{ completed: false }})().map({REMINDER_JSON}));"
        );
        parse_json(&script::run_jxa(&script).await?)
    }

    pub async fn search(&self, text: &str) -> BackendResult<Vec<Reminder>> {
        let script = format!(
            "const R = Application('Reminders');\n\
             const q = {q};\n\
             JSON.stringify(R.reminders.whose({{ _or: [{{ name: {{ _contains: q }} }}, {{ body: {{ _contains: q }} }}] }})().map({REMINDER_JSON}));",
            q = js_literal(text),
        );
        parse_json(&script::run_jxa(&script).await?)
    }

    /// Bring Reminders to the front showing the first match.
    pub async fn open(&self, text: &str) -> BackendResult<Option<Reminder>> {
        let found = self.search(text).await?;
        let Some(first) = found.into_iter().next() else {
            return Ok(None);
        };
        let script = format!(
            "const R = Application('Reminders');\n\
             R.activate();\n\
             const r = R.reminders.byId({id});\n\
             R.show(r);\n\
             'ok';",
            id = js_literal(&first.id),
        );
        script::run_jxa(&script).await?;
        Ok(Some(first))
    }

    pub async fn by_list_id(&self, list_id: &str) -> BackendResult<Vec<Reminder>> {
        let script = format!(
            "const R = Application('Reminders');\n\
             const list = R.lists.byId({id});\n\
             JSON.stringify(list.reminders().map({REMINDER_JSON}));",
            id = js_literal(list_id),
        );
        parse_json(&script::run_jxa(&script).await?)
    }

    pub async fn create(&self, reminder: &NewReminder) -> BackendResult<Reminder> {
        if reminder.name.trim().is_empty() {
            return Err(BackendError::Rejected("reminder name must not be empty".to_string()));
        }
        let list = match reminder.list_name.as_deref() {
            Some(name) => format!(
                "(R.lists.whose({{ name: {n} }})().length ? R.lists.whose({{ name: {n} }})()[0] : R.defaultList())",
                n = js_literal(name)
            ),
            None => "R.defaultList()".to_string(),
        };
        let mut props = format!("name: {}", js_literal(&reminder.name));
        if let Some(notes) = reminder.notes.as_deref() {
            props.push_str(&format!(", body: {}", js_literal(notes)));
        }
        if let Some(due) = reminder.due_date.as_deref() {
            props.push_str(&format!(", dueDate: new Date({})", js_literal(due)));
        }
        let script = format!(
            "const R = Application('Reminders');\n\
             const list = {list};\n\
             const r = R.Reminder({{ {props} }});\n\
             list.reminders.push(r);\n\
             JSON.stringify(({REMINDER_JSON})(list.reminders()[list.reminders().length - 1]));"
        );
        let output = script::run_jxa(&script).await?;
        Ok(serde_json::from_str(output.trim())?)
    }
}
