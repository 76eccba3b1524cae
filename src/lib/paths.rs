//! Path discovery shared by both binaries: bundled templates and the local config directory.

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::lib::errors::TemplateError;

/// Environment variable overriding the bundled template location.
pub const TEMPLATES_ENV: &str = "HYDRA_PROGRAM_TEMPLATES";
/// Directory name of the bundled templates.
pub const TEMPLATES_DIR_NAME: &str = "config_templates";
/// Candidate config directory names, in priority order.
pub const CONFIG_DIR_CANDIDATES: [&str; 2] = ["config", "configs"];
/// Destination directory written by `hpinit`.
pub const INIT_DESTINATION_DIR: &str = "config";

/// Returns true if the path is non-empty and absolute.
pub fn is_nonempty_absolute(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.is_absolute()
}

/// Resolve the bundled template root.
///
/// Resolution order:
/// 1. `$HYDRA_PROGRAM_TEMPLATES` when set (must exist).
/// 2. `config_templates` next to the executable, then `../share/hydra-program/config_templates`.
/// 3. `config_templates` in the crate source tree.
pub fn resolve_template_root() -> Result<PathBuf, TemplateError> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    resolve_template_root_from(
        env::var_os(TEMPLATES_ENV),
        exe_dir.as_deref(),
        Some(Path::new(env!("CARGO_MANIFEST_DIR"))),
    )
}

/// Resolve the template root from explicit inputs (testable helper).
fn resolve_template_root_from(
    env_override: Option<OsString>,
    exe_dir: Option<&Path>,
    manifest_dir: Option<&Path>,
) -> Result<PathBuf, TemplateError> {
    if let Some(value) = env_override.filter(|value| !value.is_empty()) {
        let path = PathBuf::from(value);
        if path.is_dir() {
            return Ok(path);
        }
        return Err(TemplateError::NotFound { path });
    }

    let mut candidates = Vec::new();
    if let Some(exe_dir) = exe_dir {
        candidates.push(exe_dir.join(TEMPLATES_DIR_NAME));
        candidates.push(
            exe_dir
                .join("..")
                .join("share")
                .join("hydra-program")
                .join(TEMPLATES_DIR_NAME),
        );
    }
    if let Some(manifest_dir) = manifest_dir {
        candidates.push(manifest_dir.join(TEMPLATES_DIR_NAME));
    }

    if let Some(found) = candidates.iter().find(|path| path.is_dir()) {
        return Ok(found.clone());
    }

    match candidates.pop() {
        Some(path) => Err(TemplateError::NotFound { path }),
        None => Err(TemplateError::Unlocatable {
            message: "neither the executable nor the source directory is known".into(),
        }),
    }
}

/// Find `config` or `configs` under `root`, preferring `config`.
pub fn discover_config_dir_in(root: &Path) -> Option<PathBuf> {
    CONFIG_DIR_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_dir())
        .map(|path| absolutize(&path))
}

/// Find the config directory under the current working directory.
pub fn discover_config_dir() -> Option<PathBuf> {
    let cwd = env::current_dir().ok()?;
    discover_config_dir_in(&cwd)
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
