//! Parsing of `defaults:` lists.

use std::path::Path;

use serde_json::Value;

use crate::lib::errors::ComposeError;

/// Marker for the file's own content inside its defaults list.
pub const SELF_ENTRY: &str = "_self_";
/// Package name placing a config at the root.
pub const GLOBAL_PACKAGE: &str = "_global_";

/// One entry of a defaults list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultEntry {
    /// `_self_`
    SelfRef,
    /// `group[@package]: option`, optionally prefixed by `optional` or `override`.
    Group {
        group: String,
        option: Option<String>,
        package: Option<String>,
        optional: bool,
        is_override: bool,
    },
    /// A plain config name such as `base` or `extra/logging`.
    Config { name: String },
}

/// Parse the value of a `defaults:` key.
///
/// `_self_` is appended when the list does not mention it.
pub fn parse_defaults(value: Value, path: &Path) -> Result<Vec<DefaultEntry>, ComposeError> {
    let invalid = |message: String| ComposeError::InvalidDefaults {
        path: path.to_path_buf(),
        message,
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => return Err(invalid(format!("expected a list, found {other}"))),
    };

    let mut entries = Vec::with_capacity(items.len() + 1);
    for item in items {
        let entry = match item {
            Value::String(name) if name == SELF_ENTRY => DefaultEntry::SelfRef,
            Value::String(name) if !name.trim().is_empty() => DefaultEntry::Config {
                name: name.trim().to_string(),
            },
            Value::Object(map) if map.len() == 1 => {
                let Some((key, option)) = map.into_iter().next() else {
                    continue;
                };
                parse_group_entry(&key, option).map_err(invalid)?
            }
            other => return Err(invalid(format!("unsupported entry {other}"))),
        };
        if entry == DefaultEntry::SelfRef && entries.contains(&DefaultEntry::SelfRef) {
            return Err(invalid("_self_ may only appear once".into()));
        }
        entries.push(entry);
    }

    if !entries.contains(&DefaultEntry::SelfRef) {
        entries.push(DefaultEntry::SelfRef);
    }
    Ok(entries)
}

fn parse_group_entry(key: &str, option: Value) -> Result<DefaultEntry, String> {
    let mut words = key.split_whitespace().collect::<Vec<_>>();
    let mut optional = false;
    let mut is_override = false;
    while words.len() > 1 {
        match words[0] {
            "optional" => optional = true,
            "override" => is_override = true,
            other => return Err(format!("unknown keyword '{other}' in '{key}'")),
        }
        words.remove(0);
    }
    let Some(target) = words.first() else {
        return Err("empty group name".into());
    };

    let (group, package) = match target.split_once('@') {
        Some((group, package)) => (group, Some(package.to_string())),
        None => (*target, None),
    };
    if group.is_empty() {
        return Err(format!("empty group name in '{key}'"));
    }

    let option = match option {
        Value::String(option) => Some(option),
        Value::Null => None,
        other => return Err(format!("option of '{group}' must be a string or null, found {other}")),
    };

    Ok(DefaultEntry::Group {
        group: group.to_string(),
        option,
        package,
        optional,
        is_override,
    })
}
