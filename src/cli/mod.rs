//! CLI entrypoint module structure and the `hpinit` template copy.
use std::{
    env,
    io::{self, Write},
    path::Path,
    sync::atomic::AtomicBool,
};

use tracing::info;

use crate::lib::{
    errors::InitError,
    fs::{ensure_dir, mirror_tree, CopyReport},
    paths::{resolve_template_root, INIT_DESTINATION_DIR},
};

pub mod args;
pub mod profile;

pub use args::{CfgTarget, InitArgs, RunArgs};
pub use profile::{
    build_launch_args, normalize_config_name, resolve_config_dir, RunProfile, DEFAULT_CONFIG_NAME,
};

/// Copy the bundled templates into `./config`, printing progress to stdout.
pub fn copy_config_templates(force: bool, cancel: &AtomicBool) -> Result<CopyReport, InitError> {
    let source = resolve_template_root()?;
    let cwd = env::current_dir().map_err(|source| InitError::CurrentDir { source })?;
    let destination = cwd.join(INIT_DESTINATION_DIR);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    copy_templates_into(&source, &destination, force, cancel, &mut out)
}

/// Mirror `source` into `destination` and write the progress lines and summary to `out`.
pub fn copy_templates_into(
    source: &Path,
    destination: &Path,
    force: bool,
    cancel: &AtomicBool,
    out: &mut dyn Write,
) -> Result<CopyReport, InitError> {
    let output = |source: io::Error| InitError::Output { source };

    writeln!(
        out,
        "Copying configuration templates from {} to {}",
        source.display(),
        destination.display()
    )
    .map_err(output)?;
    ensure_dir(destination)?;

    let mut write_failure = None;
    let report = mirror_tree(source, destination, force, cancel, |action, relative| {
        if write_failure.is_none() {
            if let Err(err) = writeln!(out, "  {}: {relative}", action.label()) {
                write_failure = Some(err);
            }
        }
    })?;
    if let Some(err) = write_failure {
        return Err(output(err));
    }

    info!(
        target: "hydra_program::init",
        copied = report.copied.len(),
        overwritten = report.overwritten.len(),
        skipped = report.skipped.len(),
        destination = %destination.display(),
        "Template copy finished"
    );
    write_summary(out, &report, destination).map_err(output)?;
    Ok(report)
}

fn write_summary(out: &mut dyn Write, report: &CopyReport, destination: &Path) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Summary:")?;
    writeln!(out, "  Copied {} file(s)", report.copied.len())?;
    if !report.skipped.is_empty() {
        writeln!(out, "  Skipped {} existing file(s)", report.skipped.len())?;
        writeln!(out, "  Use --force to overwrite existing files")?;
    }

    if report.is_empty() {
        writeln!(out, "No files to copy.")
    } else {
        writeln!(out)?;
        writeln!(
            out,
            "Configuration templates have been initialized in: {}",
            destination.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn run(source: &Path, destination: &Path, force: bool) -> (CopyReport, String) {
        let cancel = AtomicBool::new(false);
        let mut out = Vec::new();
        let report = copy_templates_into(source, destination, force, &cancel, &mut out)
            .expect("copy succeeds");
        (report, String::from_utf8(out).expect("output is utf-8"))
    }

    #[test]
    fn first_run_copies_everything_and_prints_summary() {
        let temp = tempdir().expect("can create temp directory");
        let source = temp.path().join("templates");
        fs::create_dir_all(source.join("program")).expect("can create template dirs");
        fs::write(source.join("hprun.yaml"), "a: 1\n").expect("can write template");
        fs::write(source.join("program").join("echo.yaml"), "b: 2\n").expect("can write template");
        let destination = temp.path().join("config");

        let (report, output) = run(&source, &destination, false);

        assert_eq!(report.copied, vec!["hprun.yaml", "program/echo.yaml"]);
        assert!(output.contains("  Copying: program/echo.yaml"), "output: {output}");
        assert!(output.contains("  Copied 2 file(s)"), "output: {output}");
        assert!(!output.contains("Skipped"), "output: {output}");
        assert!(output.ends_with(&format!(
            "Configuration templates have been initialized in: {}\n",
            destination.display()
        )));
    }

    #[test]
    fn second_run_skips_and_hints_force() {
        let temp = tempdir().expect("can create temp directory");
        let source = temp.path().join("templates");
        fs::create_dir_all(&source).expect("can create template dir");
        fs::write(source.join("hprun.yaml"), "a: 1\n").expect("can write template");
        let destination = temp.path().join("config");
        run(&source, &destination, false);

        let (report, output) = run(&source, &destination, false);

        assert!(report.copied.is_empty());
        assert_eq!(report.skipped, vec!["hprun.yaml"]);
        assert!(output.contains("  Skipping existing file: hprun.yaml"));
        assert!(output.contains("  Skipped 1 existing file(s)"));
        assert!(output.contains("  Use --force to overwrite existing files"));
    }

    #[test]
    fn force_reports_overwrites() {
        let temp = tempdir().expect("can create temp directory");
        let source = temp.path().join("templates");
        fs::create_dir_all(&source).expect("can create template dir");
        fs::write(source.join("hprun.yaml"), "a: 1\n").expect("can write template");
        let destination = temp.path().join("config");
        fs::create_dir_all(&destination).expect("can create destination");
        fs::write(destination.join("hprun.yaml"), "local: edit\n").expect("can write local file");

        let (report, output) = run(&source, &destination, true);

        assert_eq!(report.overwritten, vec!["hprun.yaml"]);
        assert!(output.contains("  Overwriting: hprun.yaml"));
        assert_eq!(
            fs::read_to_string(destination.join("hprun.yaml")).expect("file readable"),
            "a: 1\n"
        );
    }

    #[test]
    fn empty_source_prints_nothing_to_copy() {
        let temp = tempdir().expect("can create temp directory");
        let source = temp.path().join("templates");
        fs::create_dir_all(source.join("empty")).expect("can create template dir");

        let (report, output) = run(&source, &temp.path().join("config"), false);

        assert!(report.is_empty());
        assert!(output.ends_with("No files to copy.\n"), "output: {output}");
    }
}
