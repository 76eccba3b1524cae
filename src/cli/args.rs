//! CLI argument definitions and `RunProfile` construction.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use super::{build_launch_args, normalize_config_name, resolve_config_dir, RunProfile};

/// Arguments of `hpinit`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hpinit",
    version,
    about = "Initialize configuration templates for hydra-program",
    long_about = None
)]
pub struct InitArgs {
    /// Overwrite existing configuration files.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

/// Which part of the composed config `--cfg` prints.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CfgTarget {
    Job,
    Hydra,
    All,
}

/// Arguments of `hprun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hprun",
    version,
    about = "Compose a configuration, instantiate its program and run it",
    long_about = None,
    after_help = "Overrides: key=value, +key=value (append), ++key=value (upsert), ~key (delete).\nWith --multirun, comma-separated values (a=1,2) sweep over every combination."
)]
pub struct RunArgs {
    /// Config overrides.
    #[arg(value_name = "OVERRIDE")]
    pub overrides: Vec<String>,
    /// Run one job per combination of swept values.
    #[arg(short = 'm', long, default_value_t = false)]
    pub multirun: bool,
    /// Print the composed config instead of running.
    #[arg(short = 'c', long, value_enum)]
    pub cfg: Option<CfgTarget>,
    /// Resolve interpolations before printing (with --cfg).
    #[arg(long, default_value_t = false, requires = "cfg")]
    pub resolve: bool,
    /// Primary config name (overrides `hprun`).
    #[arg(long = "config-name", default_value = super::DEFAULT_CONFIG_NAME)]
    pub config_name: String,
    /// Config directory (overrides the discovered `config` or `configs`).
    #[arg(long = "config-dir")]
    pub config_dir: Option<PathBuf>,
}

impl RunArgs {
    /// Build a `RunProfile`, falling back to the directory discovered at startup.
    pub fn into_profile(self, discovered: Option<PathBuf>) -> Result<RunProfile> {
        let config_dir = match self.config_dir {
            Some(dir) => Some(resolve_config_dir(dir).context("failed to resolve --config-dir")?),
            None => discovered,
        };
        let config_name = normalize_config_name(&self.config_name);
        let launch_args = build_launch_args(config_dir.as_deref(), &config_name, &self.overrides);

        Ok(RunProfile {
            config_dir,
            config_name,
            overrides: self.overrides,
            multirun: self.multirun,
            cfg: self.cfg,
            resolve: self.resolve,
            launch_args,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn run_args_collect_overrides_and_flags() {
        let args = RunArgs::try_parse_from(["hprun", "-m", "a=1,2", "+b=x", "--cfg", "job"])
            .expect("arguments parse");

        assert!(args.multirun);
        assert_eq!(args.overrides, vec!["a=1,2", "+b=x"]);
        assert_eq!(args.cfg, Some(CfgTarget::Job));
        assert_eq!(args.config_name, "hprun");
    }

    #[test]
    fn resolve_requires_cfg() {
        let result = RunArgs::try_parse_from(["hprun", "--resolve"]);

        assert!(result.is_err());
    }

    #[test]
    fn delete_overrides_are_not_flags() {
        let args = RunArgs::try_parse_from(["hprun", "~db"]).expect("arguments parse");

        assert_eq!(args.overrides, vec!["~db"]);
    }

    #[test]
    fn profile_prefers_explicit_config_dir() {
        let discovered = PathBuf::from("/discovered/config");
        let args = RunArgs::try_parse_from(["hprun", "--config-dir", "/explicit", "--config-name", "main.yaml"])
            .expect("arguments parse");

        let profile = args.into_profile(Some(discovered)).expect("profile builds");

        assert_eq!(profile.config_dir, Some(PathBuf::from("/explicit")));
        assert_eq!(profile.config_name, "main");
    }

    #[test]
    fn init_args_parse_force() {
        let args = InitArgs::try_parse_from(["hpinit", "--force"]).expect("arguments parse");

        assert!(args.force);
    }
}
