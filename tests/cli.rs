//! Tests de integración del binario
//! tests/cli.rs
//!
//! Ejecutan `jobpool` sobre archivos temporales y verifican la salida.

use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

/// Helper: crea un archivo temporal con las líneas dadas
fn input_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

fn jobpool() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_jobpool"));
    cmd.env_clear()
        .env("RUST_LOG", "warn")
        .args(["--workers-min", "2", "--workers-max", "4", "--stat-interval-ms", "0"]);
    cmd
}

#[test]
fn test_words_in_input_order() {
    let lines: Vec<String> = (0..200).map(|i| "w ".repeat(i % 7 + 1)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let file = input_file(&refs);

    let output = jobpool().arg(file.path()).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let rows: Vec<&str> = stdout.lines().collect();
    assert_eq!(rows.len(), 200);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(*row, format!("{}\t{}", i + 1, i % 7 + 1));
    }
}

#[test]
fn test_grep_task() {
    let file = input_file(&["error: disk", "ok", "error error"]);
    let output = jobpool()
        .args(["--task", "grep", "--pattern", "error"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "1\t1\n2\t0\n3\t2\n");
}

#[test]
fn test_sum_tolerates_bad_lines() {
    let file = input_file(&["1 2 3", "x", "10,20"]);
    let output = jobpool().args(["--task", "sum"]).arg(file.path()).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "1\t6\n3\t30\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("some lines failed"));
}

#[test]
fn test_sum_fail_fast_exits_with_error() {
    let file = input_file(&["1", "x", "3"]);
    let output = jobpool()
        .args(["--task", "sum", "--fail-fast"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_invalid_config_rejected() {
    let file = input_file(&["a"]);
    let output = jobpool()
        .args(["--task", "grep"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--pattern"));
}

#[test]
fn test_missing_input_file() {
    let output = jobpool().arg("/nonexistent/jobpool-input.txt").output().unwrap();
    assert!(!output.status.success());
}
