//! Compose one config tree from a primary file, its defaults list and group overrides.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    config::{
        defaults::{parse_defaults, DefaultEntry, GLOBAL_PACKAGE},
        node::{merge, wrap_at_package},
        overrides::{Override, OverrideKind},
    },
    lib::errors::{ComposeError, OverrideError},
};

/// Extensions tried, in order, when looking up a config name.
pub const CONFIG_EXTENSIONS: [&str; 4] = ["yaml", "yml", "json", "toml"];
/// Key holding the defaults list inside a config file.
pub const DEFAULTS_KEY: &str = "defaults";

/// A directory of config files and config groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    dir: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Find `<dir>/<name>.<ext>` for the first supported extension.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let name = name.trim_start_matches('/');
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
    }

    /// True when `group` (slash or dot separated) is a directory of options.
    pub fn is_group(&self, group: &str) -> bool {
        let Some(dir) = self.dir.as_ref() else {
            return false;
        };
        let group = group.split('@').next().unwrap_or(group).replace('.', "/");
        !group.is_empty() && dir.join(group).is_dir()
    }
}

/// Read one config file (format chosen by extension) into a tree.
///
/// Keys are kept exactly as written: no case folding, no dotted-key splitting.
pub fn load_file(path: &Path) -> Result<Value, ComposeError> {
    let text = fs::read_to_string(path).map_err(|source| ComposeError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| ComposeError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let value = match extension.as_str() {
        "json" => serde_json::from_str::<Value>(&text).map_err(|err| parse_error(err.to_string()))?,
        "toml" => toml::from_str::<Value>(&text).map_err(|err| parse_error(err.to_string()))?,
        _ if text.trim().is_empty() => Value::Null,
        _ => {
            let yaml: serde_yaml_ng::Value =
                serde_yaml_ng::from_str(&text).map_err(|err| parse_error(err.to_string()))?;
            serde_json::to_value(yaml).map_err(|err| parse_error(err.to_string()))?
        }
    };

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ComposeError::InvalidDefaults {
            path: path.to_path_buf(),
            message: "config root must be a mapping".into(),
        }),
    }
}

/// Composes the primary config named `name` found in `source`.
#[derive(Debug, Clone)]
pub struct Composer {
    source: ConfigSource,
    name: String,
}

impl Composer {
    pub fn new(source: ConfigSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
        }
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split overrides into (group selections, value overrides).
    pub fn split_overrides(&self, overrides: &[Override]) -> (Vec<Override>, Vec<Override>) {
        overrides
            .iter()
            .cloned()
            .partition(|item| self.source.is_group(&item.key))
    }

    /// Load the primary config and everything its defaults list pulls in.
    pub fn compose(&self, group_overrides: &[Override]) -> Result<Value, ComposeError> {
        let primary =
            self.source
                .find(&self.name)
                .ok_or_else(|| ComposeError::PrimaryConfigNotFound {
                    name: self.name.clone(),
                    search_dir: self.source.dir.clone(),
                })?;

        let mut choices = GroupChoices::from_overrides(group_overrides)?;
        let mut stack = Vec::new();
        let mut root = self.compose_file(&primary, "", "", &mut choices, &mut stack)?;

        for (group, option) in choices.take_appended() {
            let child = self.compose_group(&group, &option, None, "", &mut choices, &mut stack)?;
            merge(&mut root, child);
        }
        choices.ensure_consumed()?;
        Ok(root)
    }

    fn compose_file(
        &self,
        path: &Path,
        group_dir: &str,
        package: &str,
        choices: &mut GroupChoices,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, ComposeError> {
        if stack.iter().any(|seen| seen == path) {
            let chain = stack
                .iter()
                .chain(std::iter::once(&path.to_path_buf()))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ComposeError::DefaultsCycle { chain });
        }
        stack.push(path.to_path_buf());
        debug!(
            target: "hydra_program::compose",
            path = %path.display(),
            package,
            "Loading config file"
        );

        let mut content = load_file(path)?;
        let defaults = content
            .as_object_mut()
            .and_then(|map| map.remove(DEFAULTS_KEY));
        let mut entries = match defaults {
            Some(value) => parse_defaults(value, path)?,
            None => vec![DefaultEntry::SelfRef],
        };
        apply_file_overrides(&mut entries, group_dir, choices);

        let mut own_content = Some(content);
        let mut result = Value::Object(Map::new());
        for entry in entries {
            match entry {
                DefaultEntry::SelfRef => {
                    if let Some(content) = own_content.take() {
                        merge(&mut result, wrap_at_package(package, content));
                    }
                }
                DefaultEntry::Group {
                    group,
                    option,
                    package: explicit_package,
                    optional,
                    ..
                } => {
                    let abs_group = absolute_name(group_dir, &group);
                    let Some(option) = choices.resolve(&abs_group, option)? else {
                        continue;
                    };
                    if optional && self.source.find(&format!("{abs_group}/{option}")).is_none() {
                        debug!(
                            target: "hydra_program::compose",
                            group = %abs_group,
                            option = %option,
                            "Skipping missing optional config group"
                        );
                        continue;
                    }
                    let child = self.compose_group(
                        &abs_group,
                        &option,
                        explicit_package.as_deref(),
                        package,
                        choices,
                        stack,
                    )?;
                    merge(&mut result, child);
                }
                DefaultEntry::Config { name } => {
                    let relative = absolute_name(group_dir, &name);
                    let file = self.source.find(&relative).ok_or_else(|| {
                        ComposeError::ConfigNotFound {
                            name: name.clone(),
                            path: path.to_path_buf(),
                        }
                    })?;
                    let sub_dir = parent_name(&relative);
                    let child_package = join_package(package, &parent_name(&name).replace('/', "."));
                    let child = self.compose_file(&file, &sub_dir, &child_package, choices, stack)?;
                    merge(&mut result, child);
                }
            }
        }

        stack.pop();
        Ok(result)
    }

    fn compose_group(
        &self,
        abs_group: &str,
        option: &str,
        explicit_package: Option<&str>,
        parent_package: &str,
        choices: &mut GroupChoices,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, ComposeError> {
        let file = self
            .source
            .find(&format!("{abs_group}/{option}"))
            .ok_or_else(|| ComposeError::GroupOptionNotFound {
                group: abs_group.to_string(),
                option: option.to_string(),
                dir: self.source.dir.clone().unwrap_or_default(),
            })?;
        let package = match explicit_package {
            Some(GLOBAL_PACKAGE) => String::new(),
            Some(package) => join_package(parent_package, package),
            None => abs_group.replace('/', "."),
        };
        self.compose_file(&file, abs_group, &package, choices, stack)
    }
}

/// Apply `override group: option` entries to the rest of the list.
fn apply_file_overrides(entries: &mut Vec<DefaultEntry>, group_dir: &str, choices: &mut GroupChoices) {
    let overrides: Vec<(String, Option<String>)> = entries
        .iter()
        .filter_map(|entry| match entry {
            DefaultEntry::Group {
                group,
                option,
                is_override: true,
                ..
            } => Some((absolute_name(group_dir, group), option.clone())),
            _ => None,
        })
        .collect();
    entries.retain(|entry| !matches!(entry, DefaultEntry::Group { is_override: true, .. }));

    for (abs_group, new_option) in overrides {
        let target = entries.iter_mut().find(|entry| match entry {
            DefaultEntry::Group { group, .. } => absolute_name(group_dir, group) == abs_group,
            _ => false,
        });
        match target {
            Some(DefaultEntry::Group { option, .. }) => *option = new_option,
            _ => choices.insert_file_override(abs_group, new_option),
        }
    }
}

fn absolute_name(group_dir: &str, name: &str) -> String {
    match name.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if group_dir.is_empty() => name.to_string(),
        None => format!("{group_dir}/{name}"),
    }
}

fn parent_name(name: &str) -> String {
    name.trim_start_matches('/')
        .rsplit_once('/')
        .map(|(parent, _)| parent.to_string())
        .unwrap_or_default()
}

fn join_package(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (_, true) => parent.to_string(),
        (true, false) => child.to_string(),
        (false, false) => format!("{parent}.{child}"),
    }
}

#[derive(Debug, Clone)]
enum GroupChoice {
    Select(Option<String>),
    Add(String),
    Upsert(String),
    Delete,
}

#[derive(Debug, Clone)]
struct ChoiceEntry {
    choice: GroupChoice,
    raw: Option<Override>,
    consumed: bool,
}

/// Group selections coming from the command line and from `override` entries.
#[derive(Debug, Default)]
struct GroupChoices {
    entries: BTreeMap<String, ChoiceEntry>,
}

impl GroupChoices {
    fn from_overrides(overrides: &[Override]) -> Result<Self, ComposeError> {
        let mut entries = BTreeMap::new();
        for item in overrides {
            let value = item.parsed_value()?;
            let option = match value {
                Some(Value::String(option)) => Some(option),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            };
            let choice = match (item.kind, option) {
                (OverrideKind::Delete, _) => GroupChoice::Delete,
                (OverrideKind::Change, option) => GroupChoice::Select(option),
                (OverrideKind::Add, Some(option)) => GroupChoice::Add(option),
                (OverrideKind::ForceAdd, Some(option)) => GroupChoice::Upsert(option),
                (_, None) => {
                    return Err(OverrideError::Syntax {
                        raw: item.raw.clone(),
                        message: "a config group option is required".into(),
                    }
                    .into())
                }
            };
            let group = item.key.split('@').next().unwrap_or(&item.key).replace('.', "/");
            entries.insert(
                group,
                ChoiceEntry {
                    choice,
                    raw: Some(item.clone()),
                    consumed: false,
                },
            );
        }
        Ok(Self { entries })
    }

    fn insert_file_override(&mut self, group: String, option: Option<String>) {
        self.entries.entry(group).or_insert(ChoiceEntry {
            choice: GroupChoice::Select(option),
            raw: None,
            consumed: false,
        });
    }

    /// Final option for `group`, given the option listed in the file.
    fn resolve(&mut self, group: &str, listed: Option<String>) -> Result<Option<String>, ComposeError> {
        let Some(entry) = self.entries.get_mut(group) else {
            return Ok(listed);
        };
        entry.consumed = true;
        match &entry.choice {
            GroupChoice::Select(option) => Ok(option.clone()),
            GroupChoice::Upsert(option) => Ok(Some(option.clone())),
            GroupChoice::Delete => Ok(None),
            GroupChoice::Add(option) => Err(OverrideError::KeyExists {
                key: group.to_string(),
                value: option.clone(),
            }
            .into()),
        }
    }

    /// Groups added with `+group=option` (or `++` for unlisted groups).
    fn take_appended(&mut self) -> Vec<(String, String)> {
        self.entries
            .iter_mut()
            .filter(|(_, entry)| !entry.consumed)
            .filter_map(|(group, entry)| match &entry.choice {
                GroupChoice::Add(option) | GroupChoice::Upsert(option) => {
                    entry.consumed = true;
                    Some((group.clone(), option.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn ensure_consumed(&self) -> Result<(), ComposeError> {
        for (group, entry) in &self.entries {
            if entry.consumed {
                continue;
            }
            if let Some(raw) = &entry.raw {
                return Err(OverrideError::KeyNotFound {
                    key: group.clone(),
                    value: raw.value.clone().unwrap_or_default(),
                }
                .into());
            }
            debug!(
                target: "hydra_program::compose",
                group = %group,
                "Unused override entry in defaults list"
            );
        }
        Ok(())
    }
}
