//! Process-level runner: job execution and exit reporting.
mod exit;
mod run;

pub use exit::RuntimeExit;
pub use run::{
    launch, JobReport, RunOutcome, Runner, SAVED_CONFIG_FILE, SAVED_HYDRA_FILE,
    SAVED_OVERRIDES_FILE,
};
