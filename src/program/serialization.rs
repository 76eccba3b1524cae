//! YAML round-trips of program configs.

use std::{fs, path::Path};

use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    lib::errors::SerializationError,
    program::{Program, TargetRegistry},
};

/// Reserved key naming the registered constructor of a mapping.
pub const TARGET_KEY: &str = "_target_";

/// Exposes the config a program was built from.
pub trait ConfigSerializable {
    /// Registered `_target_` of the type.
    fn target(&self) -> &'static str;

    /// Constructor parameters and their current values.
    fn config_fields(&self) -> Map<String, Value>;

    /// `{_target_: ..., <param>: <value>...}`
    fn config(&self) -> Value {
        let mut config = Map::new();
        config.insert(TARGET_KEY.to_string(), Value::String(self.target().to_string()));
        config.extend(self.config_fields());
        Value::Object(config)
    }

    /// Write [`config`](Self::config) to `path` as YAML.
    fn to_yaml(&self, path: &Path) -> Result<(), SerializationError> {
        write_yaml(path, &self.config())
    }
}

/// Serialize `value` to `path`, creating parent directories.
pub fn write_yaml(path: &Path, value: &Value) -> Result<(), SerializationError> {
    let io_error = |source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let text = serde_yaml_ng::to_string(value).map_err(|source| SerializationError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(io_error)
}

/// Read a YAML document into a tree.
pub fn read_yaml(path: &Path) -> Result<Value, SerializationError> {
    let text = fs::read_to_string(path).map_err(|source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml_ng::from_str(&text).map_err(|source| SerializationError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a program from a YAML file.
///
/// When `config_key` is present in the document, only that subtree is used.
/// A `_target_` different from `expected_target` is logged and instantiated anyway.
pub fn from_yaml(
    registry: &TargetRegistry,
    path: &Path,
    config_key: Option<&str>,
    expected_target: Option<&str>,
) -> Result<Box<dyn Program>, SerializationError> {
    let mut document = read_yaml(path)?;
    if let Some(key) = config_key {
        if let Some(inner) = document.as_object_mut().and_then(|map| map.remove(key)) {
            document = inner;
        }
    }
    if !document.is_object() {
        return Err(SerializationError::NotAMapping {
            path: path.to_path_buf(),
        });
    }

    let found = document.get(TARGET_KEY).and_then(Value::as_str);
    if let (Some(expected), Some(found)) = (expected_target, found) {
        if expected != found {
            warn!(
                target: "hydra_program::registry",
                expected,
                found,
                path = %path.display(),
                "Target in file differs from the requested one; instantiating {found} instead"
            );
        }
    }

    Ok(registry.instantiate_program(&document)?)
}
