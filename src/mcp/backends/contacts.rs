use std::collections::BTreeMap;

use crate::mcp::backends::split_lines;
use crate::mcp::error::BackendResult;
use crate::mcp::script::{self, quote};

/// Contacts.app access.
pub struct Contacts;

impl Contacts {
    pub fn new() -> Self {
        Self
    }

    pub async fn connect() -> BackendResult<Self> {
        script::probe("Contacts", r#"tell application "Contacts" to count every person"#).await?;
        Ok(Self::new())
    }

    /// Every contact that has at least one phone number, keyed by name.
    pub async fn all_numbers(&self) -> BackendResult<BTreeMap<String, Vec<String>>> {
        let output = script::run_applescript(&numbers_script("every person")).await?;
        Ok(parse_numbers(&output))
    }

    /// Phone numbers of every contact whose name contains `name`.
    pub async fn find_numbers(&self, name: &str) -> BackendResult<Vec<String>> {
        let selection = format!("every person whose name contains {}", quote(name));
        let output = script::run_applescript(&numbers_script(&selection)).await?;
        Ok(parse_numbers(&output).into_values().flatten().collect())
    }
}

fn numbers_script(selection: &str) -> String {
    format!(
        r#"tell application "Contacts"
    set out to ""
    set AppleScript's text item delimiters to ";"
    repeat with p in ({selection})
        set nums to value of every phone of p
        if (count of nums) > 0 then
            set out to out & (name of p) & tab & (nums as text) & linefeed
        end if
    end repeat
    set AppleScript's text item delimiters to ""
    return out
end tell"#
    )
}

fn parse_numbers(output: &str) -> BTreeMap<String, Vec<String>> {
    let mut contacts: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in split_lines(output) {
        let [name, numbers] = row.as_slice() else {
            continue;
        };
        let numbers = numbers
            .split(';')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        contacts.entry(name.to_string()).or_default().extend(numbers);
    }
    contacts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers_merges_duplicate_names() {
        let parsed = parse_numbers("Ann\t+1 555;+1 556\nBob\t+44 20\nAnn\t+1 557\nbroken line\n");
        assert_eq!(parsed["Ann"], vec!["+1 555", "+1 556", "+1 557"]);
        assert_eq!(parsed["Bob"], vec!["+44 20"]);
        assert_eq!(parsed.len(), 2);
    }
}
