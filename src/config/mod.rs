//! Configuration loading: composition, overrides, interpolation and the runtime node.

pub mod compose;
pub mod defaults;
pub mod hydra;
pub mod interpolation;
pub mod node;
pub mod overrides;

pub use compose::{load_file, ConfigSource, Composer, CONFIG_EXTENSIONS};
pub use hydra::{HydraSettings, JobRuntime, RunMode, HYDRA_KEY};
pub use interpolation::{resolve_in_place, Resolver, MISSING_VALUE};
pub use overrides::{apply_overrides, expand_sweeps, parse_overrides, Override, OverrideKind};
