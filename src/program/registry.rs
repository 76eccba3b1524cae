//! Registry mapping `_target_` strings to constructors.

use std::{collections::BTreeMap, fmt};

use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    config::MISSING_VALUE,
    lib::errors::InstantiateError,
    program::{builtin, Arguments, Instance, Program, TARGET_KEY},
};

/// Positional arguments bound to the declared parameters in order.
pub const ARGS_KEY: &str = "_args_";
/// `false` passes nested configs to the constructor uninstantiated.
pub const RECURSIVE_KEY: &str = "_recursive_";
/// Partial instantiation is not supported.
pub const PARTIAL_KEY: &str = "_partial_";

/// Builds a program from its arguments.
pub type Constructor = fn(&mut Arguments<'_>) -> Result<Box<dyn Program>, InstantiateError>;

/// One registered target.
#[derive(Clone, Copy)]
pub struct TargetEntry {
    /// Parameter names, in the order `_args_` binds them.
    pub params: &'static [&'static str],
    pub constructor: Constructor,
}

impl fmt::Debug for TargetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetEntry")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Maps target strings to constructors.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    entries: BTreeMap<String, TargetEntry>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled programs.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) a target.
    pub fn register(
        &mut self,
        target: impl Into<String>,
        params: &'static [&'static str],
        constructor: Constructor,
    ) -> &mut Self {
        let target = target.into();
        debug!(target: "hydra_program::registry", program = %target, "Registered target");
        self.entries.insert(target, TargetEntry { params, constructor });
        self
    }

    pub fn contains(&self, target: &str) -> bool {
        self.entries.contains_key(target)
    }

    pub fn get(&self, target: &str) -> Option<&TargetEntry> {
        self.entries.get(target)
    }

    /// Registered target names, sorted.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Instantiate any node: `_target_` mappings become programs, containers are walked.
    pub fn instantiate(&self, node: &Value) -> Result<Instance, InstantiateError> {
        self.instantiate_at(node, "")
    }

    /// Instantiate a root that must be a program.
    pub fn instantiate_program(&self, node: &Value) -> Result<Box<dyn Program>, InstantiateError> {
        self.instantiate_program_at(node, "")
    }

    pub(crate) fn instantiate_program_at(
        &self,
        node: &Value,
        path: &str,
    ) -> Result<Box<dyn Program>, InstantiateError> {
        match node {
            Value::Object(map) if map.contains_key(TARGET_KEY) => self.build(map, path),
            _ => Err(InstantiateError::NotAProgram {
                path: display_path(path),
            }),
        }
    }

    fn instantiate_at(&self, node: &Value, path: &str) -> Result<Instance, InstantiateError> {
        match node {
            Value::String(text) if text == MISSING_VALUE => Err(InstantiateError::MissingValue {
                path: display_path(path),
            }),
            Value::Object(map) if map.contains_key(TARGET_KEY) => {
                self.build(map, path).map(Instance::Program)
            }
            Value::Object(map) => map
                .iter()
                .map(|(key, child)| {
                    self.instantiate_at(child, &child_path(path, key))
                        .map(|instance| (key.clone(), instance))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Instance::Map),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, child)| self.instantiate_at(child, &child_path(path, &index.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(Instance::List),
            other => Ok(Instance::Value(other.clone())),
        }
    }

    fn build(&self, map: &Map<String, Value>, path: &str) -> Result<Box<dyn Program>, InstantiateError> {
        let target = map
            .get(TARGET_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| InstantiateError::InvalidTarget {
                path: display_path(path),
            })?;
        let entry = self
            .entries
            .get(target)
            .ok_or_else(|| InstantiateError::UnknownTarget {
                target: target.to_string(),
                path: display_path(path),
            })?;
        let invalid = |param: &str, message: &str| InstantiateError::InvalidArgument {
            target: target.to_string(),
            param: param.to_string(),
            message: message.to_string(),
        };

        let recursive = match map.get(RECURSIVE_KEY) {
            None => true,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => return Err(invalid(RECURSIVE_KEY, "expected a boolean")),
        };
        if map.get(PARTIAL_KEY).and_then(Value::as_bool) == Some(true) {
            return Err(invalid(PARTIAL_KEY, "partial instantiation is not supported"));
        }

        let mut raw: Vec<(String, &Value)> = Vec::new();
        match map.get(ARGS_KEY) {
            None => {}
            Some(Value::Array(positional)) => {
                if positional.len() > entry.params.len() {
                    return Err(invalid(
                        ARGS_KEY,
                        &format!(
                            "{} positional arguments given but only {} parameters declared",
                            positional.len(),
                            entry.params.len()
                        ),
                    ));
                }
                for (param, value) in entry.params.iter().zip(positional) {
                    if map.contains_key(*param) {
                        return Err(invalid(*param, "given both positionally and by name"));
                    }
                    raw.push(((*param).to_string(), value));
                }
            }
            Some(_) => return Err(invalid(ARGS_KEY, "expected a list")),
        }
        raw.extend(
            map.iter()
                .filter(|(key, _)| !is_reserved(key))
                .map(|(key, value)| (key.clone(), value)),
        );

        let mut values = BTreeMap::new();
        for (key, value) in raw {
            let child = child_path(path, &key);
            let instance = if recursive {
                self.instantiate_at(value, &child)?
            } else if value.as_str() == Some(MISSING_VALUE) {
                return Err(InstantiateError::MissingValue {
                    path: display_path(&child),
                });
            } else {
                Instance::Value(value.clone())
            };
            values.insert(key, instance);
        }

        debug!(
            target: "hydra_program::registry",
            program = target,
            path = %display_path(path),
            recursive,
            "Instantiating target"
        );
        let mut arguments = Arguments::new(self, target, path, values);
        let program = (entry.constructor)(&mut arguments)?;
        arguments.warn_unused();
        Ok(program)
    }
}

fn is_reserved(key: &str) -> bool {
    matches!(key, TARGET_KEY | ARGS_KEY | RECURSIVE_KEY | PARTIAL_KEY)
}

pub(crate) fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}
