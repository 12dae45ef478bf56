//! One module per automation backend. Each exposes `connect()` (construct +
//! access probe, used by the initializer) and thin one-shot operations.

use serde::de::DeserializeOwned;

use crate::mcp::error::BackendResult;

pub mod calendar;
pub mod contacts;
pub mod mail;
pub mod maps;
pub mod messages;
pub mod notes;
pub mod reminders;
pub mod web_search;

/// Embed `value` in a JXA script as a JavaScript string literal.
pub(crate) fn js_literal(value: &str) -> String {
    // A JSON string is a valid JS string literal.
    serde_json::Value::String(value.to_string()).to_string()
}

/// Parse the `JSON.stringify` output of a JXA script. Empty output means no
/// results.
pub(crate) fn parse_json<T: DeserializeOwned + Default>(output: &str) -> BackendResult<T> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Tab separated lines as printed by list-style AppleScripts.
pub(crate) fn split_lines(output: &str) -> Vec<Vec<&str>> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(|line| line.split('\t').map(str::trim).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_literal_escapes_quotes() {
        assert_eq!(js_literal(r#"a "b""#), r#""a \"b\"""#);
        assert_eq!(js_literal("line\nbreak"), r#""line\nbreak""#);
    }

    #[test]
    fn test_parse_json_treats_empty_as_default() {
        let parsed: Vec<String> = parse_json("  ").unwrap();
        assert!(parsed.is_empty());
        let parsed: Vec<String> = parse_json(r#"["a"]"#).unwrap();
        assert_eq!(parsed, vec!["a".to_string()]);
    }

    #[test]
    fn test_split_lines_skips_blanks() {
        let rows = split_lines("Ann\t+1 555\n\nBob\t+1 666; +1 777\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["Bob", "+1 666; +1 777"]);
    }
}
