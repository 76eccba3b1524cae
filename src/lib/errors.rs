use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures while locating the bundled configuration templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A candidate was selected but does not exist on disk.
    #[error("Config templates directory not found: {path}")]
    NotFound { path: PathBuf },
    /// No candidate location could be derived at all.
    #[error("Could not locate config_templates: {message}")]
    Unlocatable { message: String },
}

/// Failures of the template copy phase.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write progress output: {source}")]
    Output {
        #[source]
        source: io::Error,
    },
    #[error("Failed to read the current working directory: {source}")]
    CurrentDir {
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("Operation cancelled by user.")]
    Interrupted,
}

/// Errors that can occur while loading and composing configuration files.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// No config directory was found, or it holds no primary config.
    #[error("Cannot find primary config '{name}'{}", describe_search_dir(.search_dir))]
    PrimaryConfigNotFound {
        name: String,
        search_dir: Option<PathBuf>,
    },
    /// Failed to read a configuration file.
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file is not valid YAML, JSON or TOML.
    #[error("Failed to parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    /// A config group option does not exist.
    #[error("Could not find '{group}/{option}' in {dir}")]
    GroupOptionNotFound {
        group: String,
        option: String,
        dir: PathBuf,
    },
    /// A plain (non-group) defaults entry points to a missing file.
    #[error("Could not load '{name}' referenced from {path}")]
    ConfigNotFound { name: String, path: PathBuf },
    /// The defaults list is malformed.
    #[error("Invalid defaults list in {path}: {message}")]
    InvalidDefaults { path: PathBuf, message: String },
    /// Two config files include each other.
    #[error("Cycle detected in defaults list: {chain}")]
    DefaultsCycle { chain: String },
    /// A value override failed against the composed tree.
    #[error(transparent)]
    Override(#[from] OverrideError),
}

fn describe_search_dir(dir: &Option<PathBuf>) -> String {
    match dir {
        Some(dir) => format!(" in {}", dir.display()),
        None => " (no config or configs directory in the working directory)".to_string(),
    }
}

/// Errors raised by command-line overrides.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OverrideError {
    #[error("Error parsing override '{raw}': {message}")]
    Syntax { raw: String, message: String },
    #[error("Could not override '{key}'. No match in config. To append to your config use +{key}={value}")]
    KeyNotFound { key: String, value: String },
    #[error("Could not append to config. An item is already at '{key}'. To override use ++{key}={value}")]
    KeyExists { key: String, value: String },
    #[error("Could not delete '{key}'. No match in config")]
    DeleteMissing { key: String },
    #[error("Could not delete '{key}'. Value mismatch (expected {expected}, found {found})")]
    DeleteMismatch {
        key: String,
        expected: String,
        found: String,
    },
    #[error("Could not override '{key}'. Parent node is not a mapping")]
    NotAMapping { key: String },
    #[error("Ambiguous value for {key}. Did you mean to run with --multirun?")]
    SweepWithoutMultirun { key: String },
}

/// Errors raised while resolving `${...}` expressions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Interpolation key '{key}' not found (while resolving '{node}')")]
    KeyNotFound { key: String, node: String },
    #[error("Recursive interpolation detected: {chain}")]
    Cycle { chain: String },
    #[error("Unsupported interpolation type '{name}' (while resolving '{node}')")]
    UnknownResolver { name: String, node: String },
    #[error("Resolver '{name}' failed for '{node}': {message}")]
    Resolver {
        name: String,
        node: String,
        message: String,
    },
    #[error("Invalid interpolation syntax in '{node}': {message}")]
    Syntax { node: String, message: String },
    #[error("Cannot embed a non-scalar node in a string (while resolving '{node}')")]
    NonScalarInString { node: String },
}

/// Errors raised while turning a resolved tree into program objects.
#[derive(Debug, Error)]
pub enum InstantiateError {
    #[error("No target registered under '{target}' (at '{path}')")]
    UnknownTarget { target: String, path: String },
    #[error("'{target}' requires argument '{param}'")]
    MissingArgument { target: String, param: String },
    #[error("'{target}' received an invalid '{param}': {message}")]
    InvalidArgument {
        target: String,
        param: String,
        message: String,
    },
    #[error("Missing mandatory value: {path}")]
    MissingValue { path: String },
    #[error("Config at '{path}' has no _target_, nothing to instantiate")]
    NotAProgram { path: String },
    #[error("Invalid _target_ at '{path}': expected a string")]
    InvalidTarget { path: String },
}

/// Errors raised by YAML (de)serialization of program configs.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("I/O failed for file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("Expected a mapping in {path}")]
    NotAMapping { path: PathBuf },
    #[error(transparent)]
    Instantiate(#[from] InstantiateError),
}
