//! Entry point for `hprun`.
use std::process::ExitCode;

use hydra_program::{program::TargetRegistry, runtime};

fn main() -> ExitCode {
    runtime::launch(TargetRegistry::with_builtins())
}
