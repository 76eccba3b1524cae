//! Programs shipped with the runner.

use std::{
    collections::BTreeMap,
    io::{self, Write},
    path::PathBuf,
    process::Command,
};

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::{
    lib::errors::InstantiateError,
    program::{Arguments, ConfigSerializable, Program, TargetRegistry},
};

pub const ECHO_TARGET: &str = "hydra_program.EchoProgram";
pub const COMMAND_TARGET: &str = "hydra_program.CommandProgram";
pub const SEQUENCE_TARGET: &str = "hydra_program.SequenceProgram";

const ECHO_PARAMS: &[&str] = &["message", "repeat", "uppercase"];
const COMMAND_PARAMS: &[&str] = &["command", "args", "cwd", "env", "check"];
const SEQUENCE_PARAMS: &[&str] = &["programs", "continue_on_error"];

pub(crate) fn register_builtins(registry: &mut TargetRegistry) {
    registry
        .register(ECHO_TARGET, ECHO_PARAMS, EchoProgram::construct)
        .register(COMMAND_TARGET, COMMAND_PARAMS, CommandProgram::construct)
        .register(SEQUENCE_TARGET, SEQUENCE_PARAMS, SequenceProgram::construct);
}

/// Prints a message to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoProgram {
    pub message: String,
    pub repeat: usize,
    pub uppercase: bool,
}

impl EchoProgram {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            repeat: 1,
            uppercase: false,
        }
    }

    pub fn with_repeat(mut self, repeat: usize) -> Self {
        self.repeat = repeat;
        self
    }

    fn construct(args: &mut Arguments<'_>) -> Result<Box<dyn Program>, InstantiateError> {
        Ok(Box::new(Self {
            message: args.require("message")?,
            repeat: args.take_or("repeat", 1)?,
            uppercase: args.take_or("uppercase", false)?,
        }))
    }

    /// Lines printed by [`Program::run`].
    pub fn lines(&self) -> Vec<String> {
        let text = if self.uppercase {
            self.message.to_uppercase()
        } else {
            self.message.clone()
        };
        vec![text; self.repeat]
    }
}

impl ConfigSerializable for EchoProgram {
    fn target(&self) -> &'static str {
        ECHO_TARGET
    }

    fn config_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("message".into(), json!(self.message));
        fields.insert("repeat".into(), json!(self.repeat));
        fields.insert("uppercase".into(), json!(self.uppercase));
        fields
    }
}

impl Program for EchoProgram {
    fn run(&mut self) -> Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for line in self.lines() {
            writeln!(out, "{line}").context("failed to write to stdout")?;
        }
        out.flush().context("failed to flush stdout")
    }
}

/// Runs an external command, inheriting stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandProgram {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// Fail when the command exits unsuccessfully.
    pub check: bool,
}

impl CommandProgram {
    fn construct(args: &mut Arguments<'_>) -> Result<Box<dyn Program>, InstantiateError> {
        Ok(Box::new(Self {
            command: args.require("command")?,
            args: args.take_or("args", Vec::new())?,
            cwd: args.take("cwd")?,
            env: args.take_or("env", BTreeMap::new())?,
            check: args.take_or("check", true)?,
        }))
    }

    fn build_command(&self) -> Command {
        let mut command = Command::new(&self.command);
        command.args(&self.args);
        command.envs(&self.env);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

impl ConfigSerializable for CommandProgram {
    fn target(&self) -> &'static str {
        COMMAND_TARGET
    }

    fn config_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("command".into(), json!(self.command));
        fields.insert("args".into(), json!(self.args));
        fields.insert(
            "cwd".into(),
            json!(self.cwd.as_ref().map(|cwd| cwd.display().to_string())),
        );
        fields.insert("env".into(), json!(self.env));
        fields.insert("check".into(), json!(self.check));
        fields
    }
}

impl Program for CommandProgram {
    fn run(&mut self) -> Result<()> {
        info!(
            target: "hydra_program::runtime",
            command = %self.command,
            args = ?self.args,
            "Running command"
        );
        let status = self
            .build_command()
            .status()
            .with_context(|| format!("failed to start `{}`", self.command))?;

        if self.check && !status.success() {
            match status.code() {
                Some(code) => bail!("`{}` exited with status {code}", self.command),
                None => bail!("`{}` was terminated by a signal", self.command),
            }
        }
        Ok(())
    }
}

/// Runs child programs in order.
pub struct SequenceProgram {
    pub programs: Vec<Box<dyn Program>>,
    /// Keep going after a failure; the run still fails at the end.
    pub continue_on_error: bool,
}

impl SequenceProgram {
    fn construct(args: &mut Arguments<'_>) -> Result<Box<dyn Program>, InstantiateError> {
        Ok(Box::new(Self {
            programs: args.take_programs("programs")?.unwrap_or_default(),
            continue_on_error: args.take_or("continue_on_error", false)?,
        }))
    }
}

impl ConfigSerializable for SequenceProgram {
    fn target(&self) -> &'static str {
        SEQUENCE_TARGET
    }

    fn config_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "programs".into(),
            Value::Array(self.programs.iter().map(|program| program.config()).collect()),
        );
        fields.insert("continue_on_error".into(), json!(self.continue_on_error));
        fields
    }
}

impl Program for SequenceProgram {
    fn run(&mut self) -> Result<()> {
        let total = self.programs.len();
        let mut failed = 0;
        for (index, program) in self.programs.iter_mut().enumerate() {
            let target = program.target();
            match program.run() {
                Ok(()) => {}
                Err(err) if self.continue_on_error => {
                    failed += 1;
                    error!(
                        target: "hydra_program::runtime",
                        step = index,
                        program = target,
                        error = %format!("{err:#}"),
                        "Sequence step failed"
                    );
                }
                Err(err) => {
                    return Err(err.context(format!("step {index} ({target}) failed")));
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {total} sequence steps failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Failing;

    impl ConfigSerializable for Failing {
        fn target(&self) -> &'static str {
            "tests.Failing"
        }

        fn config_fields(&self) -> Map<String, Value> {
            Map::new()
        }
    }

    impl Program for Failing {
        fn run(&mut self) -> Result<()> {
            bail!("boom")
        }
    }

    #[test]
    fn echo_defaults_and_uppercase() {
        let program = TargetRegistry::with_builtins()
            .instantiate_program(&json!({
                "_target_": ECHO_TARGET,
                "message": "hi",
                "repeat": 2,
                "uppercase": true
            }))
            .expect("instantiation succeeds");

        assert_eq!(program.config()["repeat"], json!(2));
        let echo = EchoProgram {
            message: "hi".into(),
            repeat: 2,
            uppercase: true,
        };
        assert_eq!(echo.lines(), vec!["HI", "HI"]);
    }

    #[test]
    fn echo_requires_a_message() {
        let error = TargetRegistry::with_builtins()
            .instantiate_program(&json!({"_target_": ECHO_TARGET}))
            .err()
            .expect("message is required");

        assert!(matches!(error, InstantiateError::MissingArgument { .. }));
    }

    #[test]
    fn command_config_lists_every_parameter() {
        let program = TargetRegistry::with_builtins()
            .instantiate_program(&json!({
                "_target_": COMMAND_TARGET,
                "command": "true",
                "env": {"A": "1"}
            }))
            .expect("instantiation succeeds");

        assert_eq!(
            program.config(),
            json!({
                "_target_": COMMAND_TARGET,
                "command": "true",
                "args": [],
                "cwd": null,
                "env": {"A": "1"},
                "check": true
            })
        );
    }

    #[cfg(unix)]
    #[test]
    fn command_failure_respects_check() {
        let mut checked = CommandProgram {
            command: "false".into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            check: true,
        };
        let mut unchecked = CommandProgram {
            check: false,
            ..checked.clone()
        };

        assert!(checked.run().is_err());
        assert!(unchecked.run().is_ok());
    }

    #[test]
    fn sequence_stops_at_first_failure() {
        let mut sequence = SequenceProgram {
            programs: vec![
                Box::new(Failing) as Box<dyn Program>,
                Box::new(EchoProgram::new("unreached")),
            ],
            continue_on_error: false,
        };

        let error = sequence.run().expect_err("failure propagates");

        assert!(format!("{error:#}").contains("boom"));
        assert!(format!("{error:#}").contains("step 0"));
    }

    #[test]
    fn sequence_can_continue_on_error() {
        let mut sequence = SequenceProgram {
            programs: vec![Box::new(Failing) as Box<dyn Program>, Box::new(Failing)],
            continue_on_error: true,
        };

        let error = sequence.run().expect_err("failures are counted");

        assert_eq!(error.to_string(), "2 of 2 sequence steps failed");
    }
}
