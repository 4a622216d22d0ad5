//! Integration tests for the `snake` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// =============================================================================
// Helpers
// =============================================================================

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("snake_test_cli").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Pad each line to 80 columns and reverse every second one.
fn snake(lines: &[&str]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let padded = format!("{:<80}", line);
            if idx % 2 == 1 {
                padded.chars().rev().collect()
            } else {
                padded
            }
        })
        .collect::<Vec<String>>()
        .join("\n")
}

fn snake_cmd(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snake"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// =============================================================================
// run
// =============================================================================

#[test]
fn run_snake_layout_file() {
    let dir = temp_dir("layout");
    let src = snake(&[r"\ inc : # > # {", "1 + << }", "41 (inc) ."]);
    std::fs::write(dir.join("prog.snake"), src).unwrap();

    let out = snake_cmd(&dir, &["run", "prog.snake"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "42");
}

#[test]
fn run_directory_loads_main() {
    let dir = temp_dir("module_dir");
    let module = dir.join("app");
    std::fs::create_dir_all(&module).unwrap();
    std::fs::write(module.join("main.snake"), snake(&["'hi' ."])).unwrap();

    let out = snake_cmd(&dir, &["run", "app"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "hi");
}

#[test]
fn run_plain_text_with_no_desnake() {
    let dir = temp_dir("plain");
    std::fs::write(dir.join("plain.snake"), "6 7 * .\n").unwrap();

    let out = snake_cmd(&dir, &["run", "plain.snake", "--no-desnake"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "42");
}

#[test]
fn config_can_disable_desnaking() {
    let dir = temp_dir("config_plain");
    std::fs::write(dir.join("snake.toml"), "[run]\ndesnake = false\n").unwrap();
    std::fs::write(dir.join("plain.snake"), "'ok' .\n").unwrap();

    let out = snake_cmd(&dir, &["run", "plain.snake"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "ok");
}

#[test]
fn runtime_error_exits_with_status_one() {
    let dir = temp_dir("runtime_error");
    std::fs::write(dir.join("bad.snake"), snake(&["1 ?t +"])).unwrap();

    let out = snake_cmd(&dir, &["run", "bad.snake"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Runtime Error: type mismatch: expected types { Number }"));
}

#[test]
fn ragged_layout_is_a_compile_error() {
    let dir = temp_dir("ragged");
    std::fs::write(dir.join("ragged.snake"), "1 .\n").unwrap();

    let out = snake_cmd(&dir, &["run", "ragged.snake"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("E001"));
    assert!(stdout(&out).is_empty());
}

#[test]
fn missing_file_is_reported() {
    let dir = temp_dir("missing");
    let out = snake_cmd(&dir, &["run", "nope.snake"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("cannot read file"));
}

#[test]
fn debug_dumps_pipeline_stages() {
    let dir = temp_dir("debug");
    std::fs::write(dir.join("dbg.snake"), snake(&["1 2 + ."])).unwrap();

    let out = snake_cmd(&dir, &["run", "dbg.snake", "--debug"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "3");
    let err = stderr(&out);
    assert!(err.contains("Tokens"));
    assert!(err.contains("Disassembly"));
    assert!(err.contains("push_num 1"));
}

// =============================================================================
// check, disasm, init
// =============================================================================

#[test]
fn check_reports_success_without_running() {
    let dir = temp_dir("check");
    std::fs::write(dir.join("c.snake"), snake(&["'never printed' ."])).unwrap();

    let out = snake_cmd(&dir, &["check", "c.snake"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("no errors found"));
    assert!(!text.contains("never printed"));
}

#[test]
fn check_rejects_unknown_character() {
    let dir = temp_dir("check_bad");
    std::fs::write(dir.join("c.snake"), "1 ~ .\n").unwrap();

    let out = snake_cmd(&dir, &["check", "c.snake", "--no-desnake"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("E002"));
}

#[test]
fn disasm_lists_functions() {
    let dir = temp_dir("disasm");
    let src = snake(&[r"\ inc : # > # {", "1 + << }", "41 (inc) ."]);
    std::fs::write(dir.join("d.snake"), src).unwrap();

    let out = snake_cmd(&dir, &["disasm", "d.snake"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("fn inc : # > #"));
    assert!(text.contains("call inc"));
}

#[test]
fn init_writes_template_once() {
    let dir = temp_dir("init");
    let out = snake_cmd(&dir, &["init"]);
    assert!(out.status.success());
    let written = std::fs::read_to_string(dir.join("snake.toml")).unwrap();
    assert!(written.contains("[run]"));

    let again = snake_cmd(&dir, &["init"]);
    assert_eq!(again.status.code(), Some(1));
}
