//! Integration tests for the HelmScript CLI.
//!
//! These tests invoke the `helm` binary as a subprocess and check
//! exit codes, stdout, and stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(deprecated)]
fn helm() -> Command {
    Command::cargo_bin("helm").unwrap()
}

fn script(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

// ---- No-args / help ----

#[test]
fn no_args_prints_usage_and_exits_1() {
    helm()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage: helm"));
}

#[test]
fn help_flag_exits_0() {
    helm()
        .arg("--help")
        .assert()
        .success()
        .stderr(predicate::str::contains("Commands:"));
}

#[test]
fn unknown_command_exits_1() {
    helm()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown command"));
}

// ---- Compile ----

#[test]
fn compile_lists_opcodes() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "launch.helm", "set throttle to 1. print \"go\".");
    helm()
        .args(["compile", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("main:"))
        .stdout(predicate::str::contains("STORE throttle"))
        .stdout(predicate::str::contains("PRINT"));
}

#[test]
fn compile_splits_trigger_parts() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "abort.helm", "on abort { print \"abort\". }");
    helm()
        .args(["compile", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("trigger-L0:"))
        .stdout(predicate::str::contains("ENDTRIGGER"))
        .stdout(predicate::str::contains("ARMTRIGGER EDGE"));
}

#[test]
fn compile_error_names_the_position() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "bad.helm", "print 1.\nset 5 to x.");
    helm()
        .args(["compile", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn compile_missing_file_exits_1() {
    helm()
        .args(["compile", "/nonexistent/script.helm"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

// ---- Run ----

#[test]
fn run_prints_script_output() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "hello.helm", "print \"hello\". print 1 + 2.");
    helm()
        .args(["run", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"))
        .stdout(predicate::str::contains("3"));
}

#[test]
fn run_loop_terminates() {
    let dir = TempDir::new().unwrap();
    let path = script(
        &dir,
        "count.helm",
        "set n to 0. until n >= 5 { print n. set n to n + 1. }",
    );
    helm()
        .args(["run", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("0"))
        .stdout(predicate::str::contains("4"));
}

#[test]
fn run_wait_consumes_script_time() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "wait.helm", "wait 0.1. print \"done\".");
    helm()
        .args(["run", path.to_str().unwrap(), "--dt", "0.05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("done"));
}

#[test]
fn run_resolves_sibling_files() {
    let dir = TempDir::new().unwrap();
    script(&dir, "greet.helm", "print \"from greet\".");
    let path = script(&dir, "main.helm", "run \"greet\". print \"back\".");
    helm()
        .args(["run", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("from greet"))
        .stdout(predicate::str::contains("back"));
}

#[test]
fn run_reports_runtime_errors_but_exits_0() {
    // A runtime error aborts the command, not the machine; the run
    // still winds down cleanly.
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "boom.helm", "print 1 / 0.");
    helm()
        .args(["run", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("division by zero"));
}

#[test]
fn run_gives_up_after_max_ticks() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "forever.helm", "until false { set x to 1. }");
    helm()
        .args(["run", path.to_str().unwrap(), "--max-ticks", "10"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("still running"));
}

#[test]
fn run_rejects_unknown_options() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "x.helm", "print 1.");
    helm()
        .args(["run", path.to_str().unwrap(), "--frobnicate"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown option"));
}
