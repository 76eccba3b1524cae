use std::fs;

use tempfile::tempdir;

use super::common::{fixture, list_files, run_hpinit, run_hprun, stderr, stdout};

#[test]
fn copies_every_template_file_into_config() {
    let temp = tempdir().expect("can create temp directory");
    let templates = fixture("tests/fixtures/templates");

    let output = run_hpinit(temp.path(), Some(&templates), &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let expected = list_files(&templates);
    assert_eq!(list_files(&temp.path().join("config")), expected);
    let text = stdout(&output);
    assert!(text.contains(&format!("  Copied {} file(s)", expected.len())), "stdout: {text}");
    assert!(text.contains("  Copying: a/b/c.yaml"), "stdout: {text}");
    assert!(text.contains("Configuration templates have been initialized in:"));
    assert!(temp.path().join("config/a/b/c.yaml").is_file());
}

#[test]
fn second_run_skips_existing_files() {
    let temp = tempdir().expect("can create temp directory");
    let templates = fixture("tests/fixtures/templates");
    run_hpinit(temp.path(), Some(&templates), &[]);

    let output = run_hpinit(temp.path(), Some(&templates), &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let total = list_files(&templates).len();
    let text = stdout(&output);
    assert!(text.contains("  Copied 0 file(s)"), "stdout: {text}");
    assert!(text.contains(&format!("  Skipped {total} existing file(s)")), "stdout: {text}");
    assert!(text.contains("  Use --force to overwrite existing files"));
}

#[test]
fn force_overwrites_local_edits() {
    let temp = tempdir().expect("can create temp directory");
    let templates = fixture("tests/fixtures/templates");
    run_hpinit(temp.path(), Some(&templates), &[]);
    let local = temp.path().join("config/hprun.yaml");
    fs::write(&local, "edited: true\n").expect("can edit copied file");

    let output = run_hpinit(temp.path(), Some(&templates), &["--force"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("  Overwriting: hprun.yaml"), "stdout: {text}");
    assert!(!text.contains("Skipped"), "stdout: {text}");
    assert_eq!(
        fs::read_to_string(&local).expect("file readable"),
        fs::read_to_string(templates.join("hprun.yaml")).expect("template readable")
    );
}

#[test]
fn missing_template_directory_exits_with_error() {
    let temp = tempdir().expect("can create temp directory");
    let missing = temp.path().join("no-such-templates");

    let output = run_hpinit(temp.path(), Some(&missing), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Error: Config templates directory not found"),
        "stderr: {}",
        stderr(&output)
    );
    assert!(!temp.path().join("config").exists());
}

#[test]
fn unknown_flag_is_rejected() {
    let temp = tempdir().expect("can create temp directory");

    let output = run_hpinit(temp.path(), None, &["--overwrite"]);

    assert!(!output.status.success());
}

#[test]
fn shipped_templates_run_out_of_the_box() {
    let temp = tempdir().expect("can create temp directory");

    let init = run_hpinit(temp.path(), None, &[]);
    assert!(init.status.success(), "stderr: {}", stderr(&init));
    assert!(temp.path().join("config/hprun.yaml").is_file());

    let run = run_hprun(temp.path(), &[]);

    assert!(run.status.success(), "stderr: {}", stderr(&run));
    assert_eq!(stdout(&run), "Hello from hprun\n");
}

#[test]
fn copy_failure_exits_with_error() {
    let temp = tempdir().expect("can create temp directory");
    let templates = fixture("tests/fixtures/templates");
    fs::create_dir_all(temp.path().join("config/hprun.yaml"))
        .expect("can create directory in place of a template file");

    let output = run_hpinit(temp.path(), Some(&templates), &["--force"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Error copying configuration templates: "),
        "stderr: {}",
        stderr(&output)
    );
}
