use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

pub const HPINIT_PATH: &str = env!("CARGO_BIN_EXE_hpinit");
pub const HPRUN_PATH: &str = env!("CARGO_BIN_EXE_hprun");
pub const TEMPLATES_ENV: &str = "HYDRA_PROGRAM_TEMPLATES";

pub fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

/// Run `hpinit` in `cwd`; `templates` is exported through the env override when set.
pub fn run_hpinit(cwd: &Path, templates: Option<&Path>, args: &[&str]) -> Output {
    let mut command = Command::new(HPINIT_PATH);
    command.current_dir(cwd).args(args).env_remove("RUST_LOG");
    match templates {
        Some(path) => command.env(TEMPLATES_ENV, path),
        None => command.env_remove(TEMPLATES_ENV),
    };
    command.output().expect("can spawn hpinit")
}

pub fn run_hprun(cwd: &Path, args: &[&str]) -> Output {
    Command::new(HPRUN_PATH)
        .current_dir(cwd)
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove(TEMPLATES_ENV)
        .output()
        .expect("can spawn hprun")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("can create dirs");
    fs::write(path, content).expect("can write file");
}

/// Relative paths of every file under `root`, sorted.
pub fn list_files(root: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, files: &mut Vec<String>) {
        for entry in fs::read_dir(dir).expect("can read dir") {
            let path = entry.expect("can read entry").path();
            if path.is_dir() {
                walk(base, &path, files);
            } else {
                let relative = path.strip_prefix(base).expect("path under base");
                files.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut files = Vec::new();
    walk(root, root, &mut files);
    files.sort();
    files
}
