//! Shared helpers for integration tests.
//!
//! These tests drive the `atomic-state` binary against real files in a
//! temporary directory.

use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Creates a state directory with a pending and a resolved file.
#[allow(unused)]
pub fn create_state_dir() -> TempDir {
    let temp = TempDir::new().unwrap();

    fs::write(
        temp.path().join("pending.json"),
        r#"{
  "task-1": { "title": "write parser" },
  "task-2": { "title": "write tests" }
}
"#,
    )
    .unwrap();
    fs::write(temp.path().join("resolved.json"), "{}\n").unwrap();

    temp
}

/// Lists temp files left behind in `dir`.
#[allow(unused)]
pub fn leftover_temp_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

/// Helper to run an `atomic-state` command in `dir`.
#[allow(unused)]
pub fn run_state(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("atomic-state");
    cmd.args(args).current_dir(dir);
    cmd.assert()
}

/// Helper to run an `atomic-state` command in `dir` with `stdin` piped in.
#[allow(unused)]
pub fn run_state_with_stdin(dir: &Path, args: &[&str], stdin: &str) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("atomic-state");
    cmd.args(args).current_dir(dir).write_stdin(stdin);
    cmd.assert()
}
