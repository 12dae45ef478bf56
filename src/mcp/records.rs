//! Decoder for the pseudo-record text that automation scripts print.
//!
//! Scripts emit one `{key:value, key:value}` group per result. The format is
//! always flat and values are never quoted, so decoding is a plain
//! brace-scan, comma-split, colon-split pipeline. Anything that does not fit
//! is skipped on its own without affecting the other records.

use std::collections::BTreeMap;

/// Fields of one pseudo-record. Values are raw, trimmed strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedRecord {
    fields: BTreeMap<String, String>,
}

impl DecodedRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Field value, or `default` when the field is missing or blank.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).filter(|v| !v.is_empty()).unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DecodedRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = DecodedRecord::default();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Decode every record in `raw` that `identifying` accepts, in input order.
pub fn decode<F>(raw: &str, identifying: F) -> Records<'_, F>
where
    F: Fn(&DecodedRecord) -> bool,
{
    Records {
        rest: raw,
        identifying,
    }
}

/// Predicate accepting records that carry at least one of `keys`.
pub fn identified_by<'k>(keys: &'k [&'k str]) -> impl Fn(&DecodedRecord) -> bool + 'k {
    move |record: &DecodedRecord| keys.iter().any(|key| record.contains(key))
}

/// Lazy iterator returned by [`decode`].
pub struct Records<'a, F> {
    rest: &'a str,
    identifying: F,
}

impl<F> Iterator for Records<'_, F>
where
    F: Fn(&DecodedRecord) -> bool,
{
    type Item = DecodedRecord;

    fn next(&mut self) -> Option<DecodedRecord> {
        loop {
            let body = next_candidate(&mut self.rest)?;
            let record = parse_fields(body);
            if !record.is_empty() && (self.identifying)(&record) {
                return Some(record);
            }
        }
    }
}

/// Advance `rest` past the next `{...}` group and return its inside.
///
/// An opener followed by another opener before any closer is unbalanced; the
/// scan restarts at the inner one.
fn next_candidate<'a>(rest: &mut &'a str) -> Option<&'a str> {
    loop {
        let open = rest.find('{')?;
        let after = &rest[open + 1..];
        match after.find(|c: char| c == '{' || c == '}') {
            Some(end) if after.as_bytes()[end] == b'}' => {
                *rest = &after[end + 1..];
                return Some(&after[..end]);
            }
            Some(inner) => *rest = &after[inner..],
            None => {
                *rest = "";
                return None;
            }
        }
    }
}

fn parse_fields(body: &str) -> DecodedRecord {
    let mut record = DecodedRecord::default();
    for fragment in body.split(',') {
        let Some((key, value)) = fragment.split_once(':') else {
            continue;
        };
        record.insert(key.trim(), value.trim());
    }
    record
}
