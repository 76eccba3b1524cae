//! Keyword arguments handed to a registered constructor.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::{
    lib::errors::InstantiateError,
    program::{registry::child_path, Instance, Program, TargetRegistry, TARGET_KEY},
};

/// Arguments of one `_target_` mapping, consumed by its constructor.
///
/// Whatever the constructor leaves behind is reported as unused.
pub struct Arguments<'r> {
    registry: &'r TargetRegistry,
    target: String,
    path: String,
    values: BTreeMap<String, Instance>,
}

impl<'r> Arguments<'r> {
    pub(crate) fn new(
        registry: &'r TargetRegistry,
        target: impl Into<String>,
        path: impl Into<String>,
        values: BTreeMap<String, Instance>,
    ) -> Self {
        Self {
            registry,
            target: target.into(),
            path: path.into(),
            values,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn contains(&self, param: &str) -> bool {
        self.values.contains_key(param)
    }

    /// Remove `param` and deserialize it; `None` when absent or null.
    pub fn take<T: DeserializeOwned>(&mut self, param: &str) -> Result<Option<T>, InstantiateError> {
        let Some(instance) = self.values.remove(param) else {
            return Ok(None);
        };
        let value = instance
            .try_into_value()
            .ok_or_else(|| self.invalid(param, "expected plain data, found a program".into()))?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| self.invalid(param, err.to_string()))
    }

    /// Like [`take`](Self::take) but the argument must be present.
    pub fn require<T: DeserializeOwned>(&mut self, param: &str) -> Result<T, InstantiateError> {
        self.take(param)?
            .ok_or_else(|| InstantiateError::MissingArgument {
                target: self.target.clone(),
                param: param.to_string(),
            })
    }

    pub fn take_or<T: DeserializeOwned>(&mut self, param: &str, default: T) -> Result<T, InstantiateError> {
        Ok(self.take(param)?.unwrap_or(default))
    }

    /// Remove `param` as a program, instantiating a raw `_target_` mapping on demand.
    pub fn take_program(&mut self, param: &str) -> Result<Option<Box<dyn Program>>, InstantiateError> {
        let Some(instance) = self.values.remove(param) else {
            return Ok(None);
        };
        let path = child_path(&self.path, param);
        self.resolve_program(instance, &path, param).map(Some)
    }

    /// Remove `param` as a list of programs.
    pub fn take_programs(
        &mut self,
        param: &str,
    ) -> Result<Option<Vec<Box<dyn Program>>>, InstantiateError> {
        let Some(instance) = self.values.remove(param) else {
            return Ok(None);
        };
        let items = match instance {
            Instance::List(items) => items,
            Instance::Value(Value::Array(items)) => items.into_iter().map(Instance::Value).collect(),
            Instance::Value(Value::Null) => return Ok(None),
            _ => return Err(self.invalid(param, "expected a list of programs".into())),
        };

        let base = child_path(&self.path, param);
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.resolve_program(item, &child_path(&base, &index.to_string()), param))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn resolve_program(
        &self,
        instance: Instance,
        path: &str,
        param: &str,
    ) -> Result<Box<dyn Program>, InstantiateError> {
        match instance {
            Instance::Program(program) => Ok(program),
            Instance::Value(value) if value.get(TARGET_KEY).is_some() => {
                self.registry.instantiate_program_at(&value, path)
            }
            _ => Err(self.invalid(param, "expected a mapping with _target_".into())),
        }
    }

    fn invalid(&self, param: &str, message: String) -> InstantiateError {
        InstantiateError::InvalidArgument {
            target: self.target.clone(),
            param: param.to_string(),
            message,
        }
    }

    /// Names and config values of the arguments nobody consumed.
    pub fn into_unused(self) -> Vec<(String, Value)> {
        self.values
            .into_iter()
            .map(|(key, instance)| (key, instance.to_config()))
            .collect()
    }

    /// Log a warning per unused argument.
    pub(crate) fn warn_unused(self) {
        let target = self.target.clone();
        for (key, value) in self.into_unused() {
            warn!(
                target: "hydra_program::registry",
                program = %target,
                "Unused argument: {key}={value}"
            );
        }
    }
}
