use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::error::McpError;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, err: &McpError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// Result of one tool invocation as sent back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub content: Vec<TextContent>,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text",
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

// Tool arguments. Each multi-operation tool is a tagged enum keyed by
// `operation`; field names follow the camelCase wire names.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactsArgs {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NotesArgs {
    Search {
        search_text: String,
    },
    List,
    Create {
        title: String,
        body: String,
        #[serde(default = "default_notes_folder")]
        folder_name: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MessagesArgs {
    Send {
        phone_number: String,
        message: String,
    },
    Read {
        phone_number: String,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Schedule {
        phone_number: String,
        message: String,
        scheduled_time: String,
    },
    Unread {
        #[serde(default = "default_limit")]
        limit: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MailArgs {
    Unread {
        account: Option<String>,
        mailbox: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Search {
        search_term: String,
        account: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Send {
        to: String,
        subject: String,
        body: String,
        cc: Option<String>,
        bcc: Option<String>,
    },
    Mailboxes {
        account: Option<String>,
    },
    Accounts,
    Latest {
        account: String,
        #[serde(default = "default_latest_limit")]
        limit: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RemindersArgs {
    List,
    Search {
        search_text: String,
    },
    Open {
        search_text: String,
    },
    Create {
        name: String,
        list_name: Option<String>,
        notes: Option<String>,
        due_date: Option<String>,
    },
    ListById {
        list_id: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CalendarArgs {
    Search {
        search_text: String,
        from_date: Option<String>,
        to_date: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Open {
        event_id: String,
    },
    List {
        from_date: Option<String>,
        to_date: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Create {
        title: String,
        start_date: String,
        end_date: String,
        location: Option<String>,
        notes: Option<String>,
        #[serde(default)]
        is_all_day: bool,
        calendar_name: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MapsArgs {
    Search {
        query: String,
    },
    Save {
        name: String,
        address: String,
    },
    Directions {
        from_address: String,
        to_address: String,
        #[serde(default = "default_transport")]
        transport_type: String,
    },
    Pin {
        name: String,
        address: String,
    },
    ListGuides,
    AddToGuide {
        address: String,
        guide_name: String,
    },
    CreateGuide {
        guide_name: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchArgs {
    pub query: String,
}

fn default_limit() -> usize {
    10
}

fn default_latest_limit() -> usize {
    5
}

fn default_notes_folder() -> String {
    "Claude".to_string()
}

fn default_transport() -> String {
    "driving".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_tag_and_camel_case_fields() {
        let args: MailArgs =
            serde_json::from_value(json!({"operation": "search", "searchTerm": "invoice"})).unwrap();
        match args {
            MailArgs::Search {
                search_term,
                account,
                limit,
            } => {
                assert_eq!(search_term, "invoice");
                assert_eq!(account, None);
                assert_eq!(limit, 10);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_multi_word_operations() {
        let args: RemindersArgs =
            serde_json::from_value(json!({"operation": "listById", "listId": "L1"})).unwrap();
        assert!(matches!(args, RemindersArgs::ListById { list_id } if list_id == "L1"));

        let args: MapsArgs =
            serde_json::from_value(json!({"operation": "listGuides"})).unwrap();
        assert!(matches!(args, MapsArgs::ListGuides));
    }

    #[test]
    fn test_notes_folder_default() {
        let args: NotesArgs = serde_json::from_value(
            json!({"operation": "create", "title": "T", "body": "B"}),
        )
        .unwrap();
        assert!(matches!(args, NotesArgs::Create { folder_name, .. } if folder_name == "Claude"));
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let parsed = serde_json::from_value::<MessagesArgs>(json!({"operation": "send"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_tool_response_shape() {
        let value = serde_json::to_value(ToolResponse::error("boom")).unwrap();
        assert_eq!(
            value,
            json!({"content": [{"type": "text", "text": "boom"}], "isError": true})
        );
    }
}
