//! Entry point for `hpinit`.
use std::{
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use clap::Parser;
use hydra_program::{
    cli::{copy_config_templates, InitArgs},
    lib::{errors::InitError, telemetry},
};
use tracing::{error, warn};

fn main() -> ExitCode {
    if let Err(err) = telemetry::init_tracing(telemetry::INIT_DEFAULT_DIRECTIVE) {
        eprintln!("{err:?}");
    }
    let args = InitArgs::parse();

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(err) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        warn!(target: "hydra_program::init", error = %err, "Failed to install Ctrl+C handler");
    }

    match copy_config_templates(args.force, &cancel) {
        Ok(_) => ExitCode::SUCCESS,
        Err(InitError::Template(err)) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
        Err(InitError::Interrupted) => {
            eprintln!("\nOperation cancelled by user.");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(target: "hydra_program::init", error = ?err, "Template copy failed");
            eprintln!("Error copying configuration templates: {err}");
            ExitCode::FAILURE
        }
    }
}
