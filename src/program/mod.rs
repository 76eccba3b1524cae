//! Runnable programs and their construction from config trees.

use std::{collections::BTreeMap, fmt};

use serde_json::{Map, Value};

pub mod arguments;
pub mod builtin;
pub mod registry;
pub mod serialization;

pub use arguments::Arguments;
pub use builtin::{CommandProgram, EchoProgram, SequenceProgram};
pub use registry::{Constructor, TargetEntry, TargetRegistry};
pub use serialization::{from_yaml, read_yaml, write_yaml, ConfigSerializable, TARGET_KEY};

/// A program the runner can execute.
///
/// Every type registered in a [`TargetRegistry`] implements this.
pub trait Program: ConfigSerializable {
    /// Execute the program. Any returned value is discarded by the runner.
    fn run(&mut self) -> anyhow::Result<()>;
}

/// Result of instantiating a config node.
pub enum Instance {
    /// A scalar, or a container passed through untouched.
    Value(Value),
    /// A mapping that carried `_target_`.
    Program(Box<dyn Program>),
    List(Vec<Instance>),
    Map(BTreeMap<String, Instance>),
}

impl Instance {
    /// Plain data view of the instance; `None` if a program sits anywhere inside.
    pub fn try_into_value(self) -> Option<Value> {
        match self {
            Instance::Value(value) => Some(value),
            Instance::Program(_) => None,
            Instance::List(items) => items
                .into_iter()
                .map(Instance::try_into_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Instance::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| item.try_into_value().map(|value| (key, value)))
                .collect::<Option<Map<_, _>>>()
                .map(Value::Object),
        }
    }

    /// Config view of the instance; programs render through [`ConfigSerializable::config`].
    pub fn to_config(&self) -> Value {
        match self {
            Instance::Value(value) => value.clone(),
            Instance::Program(program) => program.config(),
            Instance::List(items) => Value::Array(items.iter().map(Instance::to_config).collect()),
            Instance::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, item)| (key.clone(), item.to_config()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instance::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Instance::Program(program) => f.debug_tuple("Program").field(&program.target()).finish(),
            Instance::List(items) => f.debug_tuple("List").field(items).finish(),
            Instance::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}
