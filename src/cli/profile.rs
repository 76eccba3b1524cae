//! RunProfile and config directory/name resolution.
use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::{config::CONFIG_EXTENSIONS, lib::paths::is_nonempty_absolute};

use super::CfgTarget;

/// Primary config name used when `--config-name` is not given.
pub const DEFAULT_CONFIG_NAME: &str = "hprun";

/// Resolved runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunProfile {
    /// `None` when no directory was discovered or given.
    pub config_dir: Option<PathBuf>,
    pub config_name: String,
    pub overrides: Vec<String>,
    pub multirun: bool,
    pub cfg: Option<CfgTarget>,
    pub resolve: bool,
    pub launch_args: Vec<String>,
}

/// Make an explicit config directory absolute against the working directory.
pub fn resolve_config_dir(path: PathBuf) -> Result<PathBuf> {
    if is_nonempty_absolute(&path) {
        return Ok(path);
    }
    let cwd = env::current_dir().context("failed to obtain current directory")?;
    Ok(cwd.join(path))
}

/// Drop a known config extension: `hprun.yaml` names the same file as `hprun`.
pub fn normalize_config_name(name: &str) -> String {
    let name = name.trim();
    CONFIG_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(&format!(".{ext}")))
        .unwrap_or(name)
        .to_string()
}

/// Equivalent command line, recorded in the launch event.
pub fn build_launch_args(config_dir: Option<&Path>, config_name: &str, overrides: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(overrides.len() + 4);
    if let Some(dir) = config_dir {
        args.push("--config-dir".to_string());
        args.push(dir.display().to_string());
    }
    args.push("--config-name".to_string());
    args.push(config_name.to_string());
    args.extend(overrides.iter().cloned());
    args
}
