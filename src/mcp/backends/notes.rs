use serde::Deserialize;

use crate::mcp::backends::{js_literal, parse_json};
use crate::mcp::error::{BackendError, BackendResult};
use crate::mcp::script;

const MAX_NOTES: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct Note {
    pub name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedNote {
    pub folder: String,
    /// True when the requested folder did not exist and had to be created.
    pub created_folder: bool,
}

/// Notes.app access.
pub struct Notes;

impl Notes {
    pub fn new() -> Self {
        Self
    }

    pub async fn connect() -> BackendResult<Self> {
        script::probe("Notes", r#"tell application "Notes" to count every note"#).await?;
        Ok(Self::new())
    }

    pub async fn list(&self) -> BackendResult<Vec<Note>> {
        let script = format!(
            r#"const Notes = Application('Notes');
const notes = Notes.notes().slice(0, {MAX_NOTES});
JSON.stringify(notes.map(n => ({{ name: n.name(), content: n.plaintext() }})));"#
        );
        parse_json(&script::run_jxa(&script).await?)
    }

    pub async fn search(&self, text: &str) -> BackendResult<Vec<Note>> {
        let script = format!(
            r#"const Notes = Application('Notes');
const q = {query};
const found = Notes.notes.whose({{ _or: [{{ name: {{ _contains: q }} }}, {{ plaintext: {{ _contains: q }} }}] }})();
JSON.stringify(found.slice(0, {MAX_NOTES}).map(n => ({{ name: n.name(), content: n.plaintext() }})));"#,
            query = js_literal(text),
        );
        parse_json(&script::run_jxa(&script).await?)
    }

    /// Create a note in `folder`, creating the folder when missing.
    pub async fn create(&self, title: &str, body: &str, folder: &str) -> BackendResult<CreatedNote> {
        if title.trim().is_empty() {
            return Err(BackendError::Rejected("note title must not be empty".to_string()));
        }
        let script = format!(
            r#"const Notes = Application('Notes');
const folderName = {folder};
let folder = Notes.folders.whose({{ name: folderName }})();
let createdFolder = false;
if (folder.length === 0) {{
    const made = Notes.Folder({{ name: folderName }});
    Notes.folders.push(made);
    folder = Notes.folders.whose({{ name: folderName }})();
    createdFolder = true;
}}
const note = Notes.Note({{ name: {title}, body: {body} }});
folder[0].notes.push(note);
JSON.stringify({{ folder: folderName, createdFolder: createdFolder }});"#,
            folder = js_literal(folder),
            title = js_literal(title),
            body = js_literal(body),
        );
        let output = script::run_jxa(&script).await?;
        Ok(serde_json::from_str(output.trim())?)
    }
}
