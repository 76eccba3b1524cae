use std::fs;

use tempfile::{tempdir, TempDir};

use super::common::{run_hprun, stderr, stdout, write_file};

const ECHO_CONFIG: &str = "\
_target_: hydra_program.EchoProgram
message: from config
";

fn project(config_dir: &str, content: &str) -> TempDir {
    let temp = tempdir().expect("can create temp directory");
    write_file(temp.path(), &format!("{config_dir}/hprun.yaml"), content);
    temp
}

#[test]
fn runs_the_program_from_config_dir() {
    let temp = project("config", ECHO_CONFIG);

    let output = run_hprun(temp.path(), &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "from config\n");
    assert!(temp.path().join("outputs").is_dir());
}

#[test]
fn config_is_preferred_over_configs() {
    let temp = project("config", ECHO_CONFIG);
    write_file(
        temp.path(),
        "configs/hprun.yaml",
        "_target_: hydra_program.EchoProgram\nmessage: from configs\n",
    );

    let output = run_hprun(temp.path(), &[]);

    assert_eq!(stdout(&output), "from config\n");
}

#[test]
fn configs_is_used_when_config_is_absent() {
    let temp = project(
        "configs",
        "_target_: hydra_program.EchoProgram\nmessage: from configs\n",
    );

    let output = run_hprun(temp.path(), &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "from configs\n");
}

#[test]
fn missing_config_directory_exits_with_error() {
    let temp = tempdir().expect("can create temp directory");

    let output = run_hprun(temp.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Cannot find primary config 'hprun'"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn undefined_interpolation_exits_with_error() {
    let temp = project(
        "config",
        "_target_: hydra_program.EchoProgram\nmessage: ${nowhere.to.be.found}\n",
    );

    let output = run_hprun(temp.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("nowhere.to.be.found"),
        "stderr: {}",
        stderr(&output)
    );
    assert!(stdout(&output).is_empty());
}

#[test]
fn program_failure_exits_with_error() {
    let temp = project(
        "config",
        "_target_: hydra_program.CommandProgram\ncommand: hydra-program-no-such-command\n",
    );

    let output = run_hprun(temp.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("failed to start"), "stderr: {}", stderr(&output));
}

#[test]
fn overrides_change_add_and_reject_unknown_keys() {
    let temp = project("config", ECHO_CONFIG);

    let changed = run_hprun(temp.path(), &["message=changed", "+repeat=2"]);
    let unknown = run_hprun(temp.path(), &["colour=red"]);

    assert!(changed.status.success(), "stderr: {}", stderr(&changed));
    assert_eq!(stdout(&changed), "changed\nchanged\n");
    assert_eq!(unknown.status.code(), Some(1));
    assert!(stderr(&unknown).contains("+colour=red"), "stderr: {}", stderr(&unknown));
}

#[test]
fn group_override_selects_program() {
    let temp = project(
        "config",
        "defaults:\n  - program@_global_: first\n  - _self_\n",
    );
    write_file(
        temp.path(),
        "config/program/first.yaml",
        "_target_: hydra_program.EchoProgram\nmessage: first\n",
    );
    write_file(
        temp.path(),
        "config/program/second.yaml",
        "_target_: hydra_program.EchoProgram\nmessage: second\nuppercase: true\n",
    );

    let default_run = run_hprun(temp.path(), &[]);
    let selected_run = run_hprun(temp.path(), &["program=second"]);

    assert_eq!(stdout(&default_run), "first\n");
    assert_eq!(stdout(&selected_run), "SECOND\n");
}

#[test]
fn cfg_job_prints_without_running() {
    let temp = project("config", ECHO_CONFIG);

    let output = run_hprun(temp.path(), &["--cfg", "job", "message=shown"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("message: shown"), "stdout: {text}");
    assert!(text.contains("_target_: hydra_program.EchoProgram"), "stdout: {text}");
    assert!(!temp.path().join("outputs").exists());
}

#[test]
fn multirun_runs_every_combination() {
    let temp = project("config", ECHO_CONFIG);

    let output = run_hprun(temp.path(), &["-m", "message=a,b", "+repeat=1"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "a\nb\n");
    let sweep_root = fs::read_dir(temp.path().join("multirun"))
        .expect("multirun dir exists")
        .next()
        .expect("one date dir")
        .expect("readable entry")
        .path();
    let time_dir = fs::read_dir(&sweep_root)
        .expect("date dir readable")
        .next()
        .expect("one time dir")
        .expect("readable entry")
        .path();
    assert!(time_dir.join("0/.hydra/overrides.yaml").is_file());
    assert!(time_dir.join("1/.hydra/config.yaml").is_file());
}

#[test]
fn sweep_without_multirun_is_rejected() {
    let temp = project("config", ECHO_CONFIG);

    let output = run_hprun(temp.path(), &["message=a,b"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--multirun"), "stderr: {}", stderr(&output));
}

#[test]
fn mixed_case_keys_resolve_and_override() {
    let temp = project(
        "config",
        "_target_: hydra_program.EchoProgram\nmessage: ${Greeting} x${Scale}\nGreeting: Hi\nScale: 2\n",
    );

    let default_run = run_hprun(temp.path(), &[]);
    let overridden = run_hprun(temp.path(), &["Greeting=Hello"]);

    assert!(default_run.status.success(), "stderr: {}", stderr(&default_run));
    assert_eq!(stdout(&default_run), "Hi x2\n");
    assert!(overridden.status.success(), "stderr: {}", stderr(&overridden));
    assert_eq!(stdout(&overridden), "Hello x2\n");
}

#[cfg(unix)]
#[test]
fn command_env_keys_keep_their_case() {
    let temp = project(
        "config",
        r#"_target_: hydra_program.CommandProgram
command: sh
args: ["-c", "echo \"$MY_VAR\""]
env:
  MY_VAR: from config
"#,
    );

    let output = run_hprun(temp.path(), &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "from config\n");
}
