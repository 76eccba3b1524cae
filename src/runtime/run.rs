//! The `hprun` job loop: compose, resolve, instantiate and run.

use std::{
    env, fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::{
    cli::{CfgTarget, RunArgs, RunProfile},
    config::{
        apply_overrides, expand_sweeps,
        hydra::{self, HydraSettings, JobRuntime, RunMode, HYDRA_KEY},
        parse_overrides, resolve_in_place, Composer, ConfigSource, Override, Resolver,
    },
    lib::{
        paths::discover_config_dir,
        telemetry::{self, JobSpan, RUNNER_DEFAULT_DIRECTIVE},
    },
    program::{write_yaml, TargetRegistry},
    runtime::RuntimeExit,
};

/// Names of the files saved in the output subdirectory.
pub const SAVED_CONFIG_FILE: &str = "config.yaml";
pub const SAVED_HYDRA_FILE: &str = "hydra.yaml";
pub const SAVED_OVERRIDES_FILE: &str = "overrides.yaml";

/// What one runner invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// `--cfg` output, already rendered as YAML.
    Printed(String),
    Completed(Vec<JobReport>),
}

/// One finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub num: usize,
    pub output_dir: PathBuf,
    pub overrides: Vec<String>,
}

/// A job's config before resolution, with its runtime node attached.
struct PreparedJob {
    tree: Value,
    runtime: JobRuntime,
}

/// Executes run profiles against a registry.
pub struct Runner<'r> {
    registry: &'r TargetRegistry,
    cwd: PathBuf,
    now: DateTime<Local>,
}

impl<'r> Runner<'r> {
    pub fn new(registry: &'r TargetRegistry, cwd: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            cwd: cwd.into(),
            now: Local::now(),
        }
    }

    /// Fix the launch time used by `${now:...}`.
    pub fn with_now(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    pub fn execute(&self, profile: &RunProfile) -> Result<RunOutcome> {
        let overrides = parse_overrides(&profile.overrides)?;
        let jobs = expand_sweeps(&overrides, profile.multirun)?;
        let composer = Composer::new(
            ConfigSource::new(profile.config_dir.clone()),
            profile.config_name.clone(),
        );
        let mode = if profile.multirun {
            RunMode::Multirun
        } else {
            RunMode::Run
        };

        if let Some(target) = profile.cfg {
            let first = jobs.first().map(Vec::as_slice).unwrap_or_default();
            let prepared = self.prepare(&composer, first, 0, mode)?;
            return self.render_cfg(prepared, target, profile.resolve).map(RunOutcome::Printed);
        }

        telemetry::emit_launch(&profile.launch_args, profile.multirun, jobs.len());
        let mut reports = Vec::with_capacity(jobs.len());
        for (num, job) in jobs.iter().enumerate() {
            if mode == RunMode::Multirun {
                info!(
                    target: "hydra_program::runtime",
                    "#{num} : {}",
                    job.iter().map(|item| item.raw.as_str()).collect::<Vec<_>>().join(" ")
                );
            }
            reports.push(self.run_job(&composer, job, num, mode)?);
        }
        Ok(RunOutcome::Completed(reports))
    }

    fn prepare(
        &self,
        composer: &Composer,
        overrides: &[Override],
        num: usize,
        mode: RunMode,
    ) -> Result<PreparedJob> {
        let (groups, values) = composer.split_overrides(overrides);
        let mut tree = composer.compose(&groups).with_context(|| {
            format!("failed to compose config '{}'", composer.name())
        })?;

        let runtime = JobRuntime {
            name: composer.name().to_string(),
            num,
            mode,
            task_overrides: overrides.iter().map(|item| item.raw.clone()).collect(),
            cwd: self.cwd.clone(),
        };
        hydra::attach_defaults(&mut tree);
        hydra::set_runtime(&mut tree, &runtime);
        apply_overrides(&mut tree, &values)?;
        Ok(PreparedJob { tree, runtime })
    }

    /// Resolve the runtime node and record where the job writes its outputs.
    fn resolve_hydra(&self, tree: &Value, mode: RunMode) -> Result<(Value, HydraSettings)> {
        let raw = tree.get(HYDRA_KEY).cloned().unwrap_or(Value::Null);
        let mut resolved = Resolver::new(tree)
            .with_now(self.now)
            .with_hydra(&raw)
            .resolve_at(HYDRA_KEY)
            .context("failed to resolve the hydra runtime node")?;
        let settings = HydraSettings::from_node(&resolved, mode, &self.cwd);
        settings.record(&mut resolved);
        Ok((resolved, settings))
    }

    fn run_job(
        &self,
        composer: &Composer,
        overrides: &[Override],
        num: usize,
        mode: RunMode,
    ) -> Result<JobReport> {
        let PreparedJob { mut tree, runtime } = self.prepare(composer, overrides, num, mode)?;
        let (hydra_node, settings) = self.resolve_hydra(&tree, mode)?;
        hydra::detach(&mut tree);

        fs::create_dir_all(&settings.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                settings.output_dir.display()
            )
        })?;
        if let Some(metadata_dir) = settings.metadata_dir() {
            save_job_files(&metadata_dir, &tree, &hydra_node, &runtime.task_overrides)?;
        }

        let span = JobSpan::start(num, &runtime.name, &settings.output_dir);
        let result = span.in_scope(|| -> Result<()> {
            resolve_in_place(&mut tree, Some(&hydra_node), self.now)
                .context("failed to resolve config interpolations")?;
            let mut program = self
                .registry
                .instantiate_program(&tree)
                .context("failed to instantiate program")?;
            program.run()
        });
        span.finish(if result.is_ok() { "succeeded" } else { "failed" });
        result?;

        Ok(JobReport {
            num,
            output_dir: settings.output_dir,
            overrides: runtime.task_overrides,
        })
    }

    fn render_cfg(&self, prepared: PreparedJob, target: CfgTarget, resolve: bool) -> Result<String> {
        let PreparedJob { mut tree, runtime } = prepared;
        let hydra_node = if resolve {
            self.resolve_hydra(&tree, runtime.mode)?.0
        } else {
            tree.get(HYDRA_KEY).cloned().unwrap_or(Value::Null)
        };
        hydra::detach(&mut tree);
        if resolve {
            resolve_in_place(&mut tree, Some(&hydra_node), self.now)
                .context("failed to resolve config interpolations")?;
        }

        let rendered = match target {
            CfgTarget::Job => tree,
            CfgTarget::Hydra => json!({ HYDRA_KEY: hydra_node }),
            CfgTarget::All => {
                let mut all = Map::new();
                all.insert(HYDRA_KEY.to_string(), hydra_node);
                if let Value::Object(task) = tree {
                    all.extend(task);
                }
                Value::Object(all)
            }
        };
        serde_yaml_ng::to_string(&rendered).context("failed to render config as YAML")
    }
}

fn save_job_files(dir: &Path, task: &Value, hydra_node: &Value, overrides: &[String]) -> Result<()> {
    write_yaml(&dir.join(SAVED_CONFIG_FILE), task)?;
    write_yaml(&dir.join(SAVED_HYDRA_FILE), &json!({ HYDRA_KEY: hydra_node }))?;
    write_yaml(&dir.join(SAVED_OVERRIDES_FILE), &json!(overrides))?;
    Ok(())
}

/// Run `hprun` with `registry` and map the result to an exit code.
pub fn launch(registry: TargetRegistry) -> ExitCode {
    let discovered = discover_config_dir();
    match bootstrap(&registry, discovered) {
        Ok(()) => ExitCode::SUCCESS,
        Err(exit) => exit.report(),
    }
}

fn bootstrap(registry: &TargetRegistry, discovered: Option<PathBuf>) -> Result<(), RuntimeExit> {
    telemetry::init_tracing(RUNNER_DEFAULT_DIRECTIVE).map_err(RuntimeExit::from_error)?;
    let profile = RunArgs::parse()
        .into_profile(discovered)
        .map_err(RuntimeExit::from_error)?;
    let cwd = env::current_dir()
        .context("failed to obtain current directory")
        .map_err(RuntimeExit::from_error)?;

    match Runner::new(registry, cwd)
        .execute(&profile)
        .map_err(RuntimeExit::from_error)?
    {
        RunOutcome::Printed(text) => print!("{text}"),
        RunOutcome::Completed(reports) => {
            for report in &reports {
                info!(
                    target: "hydra_program::runtime",
                    job_num = report.num,
                    output_dir = %report.output_dir.display(),
                    "Job outputs saved"
                );
            }
        }
    }
    Ok(())
}
