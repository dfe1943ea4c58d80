//! Minimal search-query matching.
//!
//! Supports `field = value` and `field = "value"` terms joined by `and`,
//! which is all the suite sends.

use serde_json::Value;

/// A parsed conjunction of equality terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    terms: Vec<(String, String)>,
}

impl Query {
    pub fn parse(query: &str) -> Self {
        let terms = split_and(query)
            .into_iter()
            .filter_map(|term| {
                let (field, value) = term.split_once('=')?;
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                Some((field.trim().to_string(), value.to_string()))
            })
            .collect();
        Self { terms }
    }

    /// True if every term matches the record's field.
    pub fn matches(&self, record: &Value) -> bool {
        self.terms.iter().all(|(field, expected)| match record.get(field) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Number(n)) => n.to_string() == *expected,
            Some(Value::Bool(b)) => b.to_string() == *expected,
            _ => false,
        })
    }
}

/// Split on ` and ` outside double quotes.
fn split_and(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut rest = query;

    while let Some(c) = rest.chars().next() {
        if c == '"' {
            quoted = !quoted;
        }
        if !quoted && rest.starts_with(" and ") {
            terms.push(std::mem::take(&mut current));
            rest = &rest[" and ".len()..];
            continue;
        }
        current.push(c);
        rest = &rest[c.len_utf8()..];
    }

    if !current.trim().is_empty() {
        terms.push(current);
    }
    terms
}

/// Collapse runs of whitespace so equivalent task queries compare equal.
pub(crate) fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
