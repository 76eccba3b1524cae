//! The per-job `hydra` runtime node: defaults, runtime fields and output settings.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::config::node::{get_path, merge, set_path, split_key};

/// Key of the runtime node in the composed tree.
pub const HYDRA_KEY: &str = "hydra";

/// Whether the runner executes one job or a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Run,
    Multirun,
}

impl RunMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RunMode::Run => "RUN",
            RunMode::Multirun => "MULTIRUN",
        }
    }
}

/// Runtime facts recorded under `hydra` for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRuntime {
    pub name: String,
    pub num: usize,
    pub mode: RunMode,
    /// Task overrides exactly as typed, after sweep expansion.
    pub task_overrides: Vec<String>,
    pub cwd: PathBuf,
}

impl JobRuntime {
    /// `key=value` pairs of the task overrides, sorted and joined by commas.
    pub fn override_dirname(&self) -> String {
        let mut items = self.task_overrides.clone();
        items.sort();
        items.join(",")
    }
}

/// Defaults of the runtime node before user settings are applied.
pub fn default_node() -> Value {
    json!({
        "run": {"dir": "outputs/${now:%Y-%m-%d}/${now:%H-%M-%S}"},
        "sweep": {
            "dir": "multirun/${now:%Y-%m-%d}/${now:%H-%M-%S}",
            "subdir": "${hydra.job.num}"
        },
        "output_subdir": ".hydra",
        "job": {"name": null, "num": 0, "override_dirname": ""},
        "runtime": {"cwd": null, "output_dir": null},
        "mode": RunMode::Run.as_str(),
        "overrides": {"task": []}
    })
}

/// Put the runtime defaults under `hydra`, letting user values win.
pub fn attach_defaults(root: &mut Value) {
    let mut node = default_node();
    if let Some(user) = root.as_object_mut().and_then(|map| map.remove(HYDRA_KEY)) {
        merge(&mut node, user);
    }
    set_path(root, &[HYDRA_KEY], node);
}

/// Record runtime facts; a user-provided `hydra.job.name` is kept.
pub fn set_runtime(root: &mut Value, runtime: &JobRuntime) {
    let name_path = split_key("hydra.job.name");
    if get_path(root, &name_path).map_or(true, Value::is_null) {
        set_path(root, &name_path, json!(runtime.name));
    }
    let fields = [
        ("hydra.job.num", json!(runtime.num)),
        ("hydra.job.override_dirname", json!(runtime.override_dirname())),
        ("hydra.mode", json!(runtime.mode.as_str())),
        ("hydra.overrides.task", json!(runtime.task_overrides)),
        ("hydra.runtime.cwd", json!(runtime.cwd.display().to_string())),
    ];
    for (key, value) in fields {
        set_path(root, &split_key(key), value);
    }
}

/// Remove and return the runtime node.
pub fn detach(root: &mut Value) -> Value {
    root.as_object_mut()
        .and_then(|map| map.remove(HYDRA_KEY))
        .unwrap_or(Value::Null)
}

/// Output locations read from a resolved runtime node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydraSettings {
    pub output_dir: PathBuf,
    /// `None` when `output_subdir` is null.
    pub output_subdir: Option<String>,
}

impl HydraSettings {
    /// Compute the job output directory (relative dirs are joined onto `cwd`).
    pub fn from_node(hydra: &Value, mode: RunMode, cwd: &Path) -> Self {
        let text = |key: &str| {
            get_path(hydra, &split_key(key)).and_then(|value| match value {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
        };
        let relative = match mode {
            RunMode::Run => PathBuf::from(text("run.dir").unwrap_or_else(|| "outputs".into())),
            RunMode::Multirun => {
                let dir = PathBuf::from(text("sweep.dir").unwrap_or_else(|| "multirun".into()));
                match text("sweep.subdir") {
                    Some(subdir) => dir.join(subdir),
                    None => dir,
                }
            }
        };
        Self {
            output_dir: cwd.join(relative),
            output_subdir: text("output_subdir").filter(|subdir| !subdir.is_empty()),
        }
    }

    /// Directory receiving the saved config files, if enabled.
    pub fn metadata_dir(&self) -> Option<PathBuf> {
        self.output_subdir
            .as_ref()
            .map(|subdir| self.output_dir.join(subdir))
    }

    /// Store `runtime.output_dir` in the resolved node.
    pub fn record(&self, hydra: &mut Value) {
        set_path(
            hydra,
            &split_key("runtime.output_dir"),
            json!(self.output_dir.display().to_string()),
        );
    }
}
