//! Command-line override parsing, sweep expansion and application to the composed tree.

use serde_json::Value;

use crate::{
    config::node::{get_path, remove_path, set_path, split_key},
    lib::errors::OverrideError,
};

/// Prefix-selected override behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// `key=value`: the key must already exist.
    Change,
    /// `+key=value`: the key must not exist yet.
    Add,
    /// `++key=value`: add or replace.
    ForceAdd,
    /// `~key` or `~key=value`.
    Delete,
}

/// A single parsed override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub kind: OverrideKind,
    pub key: String,
    /// Raw value text; `None` only for `~key`.
    pub value: Option<String>,
    /// The override exactly as typed.
    pub raw: String,
}

impl Override {
    /// Parse one `[+|++|~]key[=value]` argument.
    pub fn parse(raw: &str) -> Result<Self, OverrideError> {
        let syntax = |message: &str| OverrideError::Syntax {
            raw: raw.to_string(),
            message: message.to_string(),
        };

        let (kind, rest) = if let Some(rest) = raw.strip_prefix("++") {
            (OverrideKind::ForceAdd, rest)
        } else if let Some(rest) = raw.strip_prefix('+') {
            (OverrideKind::Add, rest)
        } else if let Some(rest) = raw.strip_prefix('~') {
            (OverrideKind::Delete, rest)
        } else {
            (OverrideKind::Change, raw)
        };

        let (key, value) = match rest.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim().to_string())),
            None if kind == OverrideKind::Delete => (rest.trim(), None),
            None => return Err(syntax("missing '=' (expected key=value)")),
        };

        if key.is_empty() {
            return Err(syntax("empty key"));
        }
        if !key.chars().all(is_key_char) {
            return Err(syntax("key may only contain letters, digits, '_', '-', '.', '/', '[' and ']'"));
        }

        Ok(Self {
            kind,
            key: key.to_string(),
            value,
            raw: raw.to_string(),
        })
    }

    /// Comma-separated alternatives at the top level of the value, if any.
    pub fn sweep_values(&self) -> Option<Vec<String>> {
        if self.kind == OverrideKind::Delete {
            return None;
        }
        let parts = split_top_level_commas(self.value.as_deref()?);
        (parts.len() > 1).then_some(parts)
    }

    /// Same override with a different value.
    fn with_value(&self, value: String) -> Self {
        let prefix = match self.kind {
            OverrideKind::Change => "",
            OverrideKind::Add => "+",
            OverrideKind::ForceAdd => "++",
            OverrideKind::Delete => "~",
        };
        Self {
            kind: self.kind,
            key: self.key.clone(),
            raw: format!("{prefix}{}={value}", self.key),
            value: Some(value),
        }
    }

    /// Path segments of the key, accepting `/` as a separator too.
    pub fn path(&self) -> Vec<String> {
        split_key(&self.key.replace('/', "."))
    }

    /// Parsed value (see [`parse_value`]).
    pub fn parsed_value(&self) -> Result<Option<Value>, OverrideError> {
        self.value
            .as_deref()
            .map(|text| parse_value(&self.raw, text))
            .transpose()
    }
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | '[' | ']' | '@')
}

/// Parse every argument in order.
pub fn parse_overrides<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Override>, OverrideError> {
    raw.iter().map(|item| Override::parse(item.as_ref())).collect()
}

/// Expand sweeps into one override list per job (cartesian product, first override varies slowest).
///
/// Without `multirun`, any sweep is rejected.
pub fn expand_sweeps(
    overrides: &[Override],
    multirun: bool,
) -> Result<Vec<Vec<Override>>, OverrideError> {
    let mut jobs: Vec<Vec<Override>> = vec![Vec::new()];
    for item in overrides {
        match item.sweep_values() {
            Some(_) if !multirun => {
                return Err(OverrideError::SweepWithoutMultirun {
                    key: item.key.clone(),
                });
            }
            Some(values) => {
                jobs = jobs
                    .into_iter()
                    .flat_map(|job| {
                        values.iter().map(move |value| {
                            let mut next = job.clone();
                            next.push(item.with_value(value.clone()));
                            next
                        })
                    })
                    .collect();
            }
            None => jobs.iter_mut().for_each(|job| job.push(item.clone())),
        }
    }
    Ok(jobs)
}

/// Parse an override value as a YAML flow node.
///
/// Empty values and values carrying `${` stay strings (quotes stripped).
pub fn parse_value(raw: &str, text: &str) -> Result<Value, OverrideError> {
    if text.is_empty() {
        return Ok(Value::String(String::new()));
    }
    if text.contains("${") {
        return Ok(Value::String(strip_quotes(text).to_string()));
    }
    let yaml: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(text).map_err(|err| OverrideError::Syntax {
            raw: raw.to_string(),
            message: err.to_string(),
        })?;
    serde_json::to_value(yaml).map_err(|err| OverrideError::Syntax {
        raw: raw.to_string(),
        message: err.to_string(),
    })
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Split on commas that are not nested in brackets, braces or quotes.
pub fn split_top_level_commas(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut current = String::new();

    for ch in text.chars() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[' | '{') => depth += 1,
            (None, ']' | '}') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current.trim().to_string());
    parts
}

/// Apply value overrides to the composed tree, in order.
pub fn apply_overrides(root: &mut Value, overrides: &[Override]) -> Result<(), OverrideError> {
    for item in overrides {
        apply_override(root, item)?;
    }
    Ok(())
}

fn apply_override(root: &mut Value, item: &Override) -> Result<(), OverrideError> {
    let path = item.path();
    let value_text = item.value.clone().unwrap_or_default();
    let exists = get_path(root, &path).is_some();

    match item.kind {
        OverrideKind::Change if !exists => {
            return Err(OverrideError::KeyNotFound {
                key: item.key.clone(),
                value: value_text,
            });
        }
        OverrideKind::Add if exists => {
            return Err(OverrideError::KeyExists {
                key: item.key.clone(),
                value: value_text,
            });
        }
        OverrideKind::Delete => return delete(root, item, &path),
        _ => {}
    }

    let value = item.parsed_value()?.unwrap_or(Value::Null);
    if set_path(root, &path, value) {
        Ok(())
    } else {
        Err(OverrideError::NotAMapping {
            key: item.key.clone(),
        })
    }
}

fn delete(root: &mut Value, item: &Override, path: &[String]) -> Result<(), OverrideError> {
    let Some(current) = get_path(root, path) else {
        return Err(OverrideError::DeleteMissing {
            key: item.key.clone(),
        });
    };
    if let Some(expected) = item.parsed_value()? {
        if current != &expected {
            return Err(OverrideError::DeleteMismatch {
                key: item.key.clone(),
                expected: expected.to_string(),
                found: current.to_string(),
            });
        }
    }
    remove_path(root, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_recognises_prefixes() {
        let parsed = parse_overrides(&["a=1", "+b=2", "++c=3", "~d", "~e=4"]).expect("all parse");
        let kinds: Vec<_> = parsed.iter().map(|item| item.kind).collect();

        assert_eq!(
            kinds,
            vec![
                OverrideKind::Change,
                OverrideKind::Add,
                OverrideKind::ForceAdd,
                OverrideKind::Delete,
                OverrideKind::Delete
            ]
        );
        assert_eq!(parsed[3].value, None);
        assert_eq!(parsed[4].value.as_deref(), Some("4"));
    }

    #[test]
    fn parse_rejects_missing_equals() {
        let error = Override::parse("lonely").expect_err("missing '=' is rejected");
        assert!(matches!(error, OverrideError::Syntax { .. }));
    }

    #[test]
    fn values_are_typed_like_yaml() {
        assert_eq!(parse_value("x", "42").expect("int"), json!(42));
        assert_eq!(parse_value("x", "0.5").expect("float"), json!(0.5));
        assert_eq!(parse_value("x", "true").expect("bool"), json!(true));
        assert_eq!(parse_value("x", "null").expect("null"), Value::Null);
        assert_eq!(parse_value("x", "[1, a]").expect("list"), json!([1, "a"]));
        assert_eq!(parse_value("x", "{k: v}").expect("map"), json!({"k": "v"}));
        assert_eq!(parse_value("x", "'007'").expect("quoted"), json!("007"));
        assert_eq!(parse_value("x", "").expect("empty"), json!(""));
        assert_eq!(
            parse_value("x", "${db.host}:1").expect("interpolation"),
            json!("${db.host}:1")
        );
    }

    #[test]
    fn apply_respects_existence_rules() {
        let mut root = json!({"db": {"port": 1}});

        apply_overrides(&mut root, &parse_overrides(&["db.port=2"]).expect("parse"))
            .expect("change existing");
        assert_eq!(root, json!({"db": {"port": 2}}));

        let missing = apply_overrides(&mut root, &parse_overrides(&["db.host=x"]).expect("parse"))
            .expect_err("change of missing key fails");
        assert!(matches!(missing, OverrideError::KeyNotFound { .. }));

        apply_overrides(&mut root, &parse_overrides(&["+db.host=x"]).expect("parse"))
            .expect("add new key");
        let exists = apply_overrides(&mut root, &parse_overrides(&["+db.host=y"]).expect("parse"))
            .expect_err("add of existing key fails");
        assert!(matches!(exists, OverrideError::KeyExists { .. }));

        apply_overrides(&mut root, &parse_overrides(&["++db.host=y", "~db.port"]).expect("parse"))
            .expect("force add and delete");
        assert_eq!(root, json!({"db": {"host": "y"}}));
    }

    #[test]
    fn delete_with_value_requires_match() {
        let mut root = json!({"mode": "fast"});

        let error = apply_overrides(&mut root, &parse_overrides(&["~mode=slow"]).expect("parse"))
            .expect_err("mismatch fails");

        assert!(matches!(error, OverrideError::DeleteMismatch { .. }));
        assert_eq!(root, json!({"mode": "fast"}));
    }

    #[test]
    fn sweeps_expand_to_cartesian_product() {
        let overrides = parse_overrides(&["a=1,2", "b=x", "c=[1,2],[3]"]).expect("parse");

        let jobs = expand_sweeps(&overrides, true).expect("multirun expands");
        let raw: Vec<Vec<&str>> = jobs
            .iter()
            .map(|job| job.iter().map(|item| item.raw.as_str()).collect())
            .collect();

        assert_eq!(
            raw,
            vec![
                vec!["a=1", "b=x", "c=[1,2]"],
                vec!["a=1", "b=x", "c=[3]"],
                vec!["a=2", "b=x", "c=[1,2]"],
                vec!["a=2", "b=x", "c=[3]"],
            ]
        );
    }

    #[test]
    fn sweeps_require_multirun() {
        let overrides = parse_overrides(&["a=1,2"]).expect("parse");

        let error = expand_sweeps(&overrides, false).expect_err("sweep needs --multirun");

        assert_eq!(
            error,
            OverrideError::SweepWithoutMultirun { key: "a".into() }
        );
    }
}
