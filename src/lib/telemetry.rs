//! Telemetry initialization and structured job events.

use std::{path::Path, time::Instant};

use anyhow::Result;
use tracing::{info, info_span, Span};
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter for `hprun`.
pub const RUNNER_DEFAULT_DIRECTIVE: &str = "info";
/// Default filter for `hpinit`, whose progress goes to stdout instead.
pub const INIT_DEFAULT_DIRECTIVE: &str = "warn";

/// Initialize `tracing` and format developer logs on stderr.
///
/// `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))
}

/// Span helper recording the start and finish of one program job.
pub struct JobSpan {
    span: Span,
    started_at: Instant,
    job_num: usize,
}

impl JobSpan {
    /// Start a job span.
    pub fn start(job_num: usize, job_name: &str, output_dir: &Path) -> Self {
        let span = info_span!(
            target: "hydra_program::runtime",
            "program_job",
            job_num,
            job_name,
            output_dir = %output_dir.display()
        );
        Self {
            span,
            started_at: Instant::now(),
            job_num,
        }
    }

    /// Run `f` inside the span.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }

    /// Close the span while recording status and elapsed time.
    pub fn finish(self, status: &'static str) {
        let elapsed_ms = self.started_at.elapsed().as_millis();
        let _entered = self.span.enter();
        info!(
            target: "hydra_program::runtime",
            job_num = self.job_num,
            status = status,
            elapsed_ms = elapsed_ms,
            "Completed program job"
        );
    }
}

/// Emit how the runner was launched.
pub fn emit_launch(launch_args: &[String], multirun: bool, jobs: usize) {
    info!(
        target: "hydra_program::runtime",
        args = %launch_args.join(" "),
        multirun,
        jobs,
        "Launching program runner"
    );
}
