use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const STATEMENT: &str = "\
Extracto de movimientos;;;
Cuenta;ES12 3456 7890 1234 5678 9012;;
;;;
Fecha;Concepto;Importe;Saldo
01/03/2024;Transferencia recibida;1.234,56;2.000,00
02/03/2024;Recibo luz;-45,10;1.954,90
03/03/2024;Compra supermercado;-23,99;1.930,91
;;;
Saldo final;;;1.930,91
";

fn pulse(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pulse").unwrap();
    cmd.env("HOME", home).env_remove("RUST_LOG");
    cmd
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_parse_prints_movements_and_summary() {
    let home = tempfile::tempdir().unwrap();
    let file = write_file(home.path(), "marzo.csv", STATEMENT.as_bytes());
    pulse(home.path())
        .arg("parse")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Transferencia recibida"))
        .stdout(predicate::str::contains("1,234.56"))
        .stdout(predicate::str::contains("3 imported"))
        .stdout(predicate::str::contains("row 4"));
}

#[test]
fn test_parse_json_outcome() {
    let home = tempfile::tempdir().unwrap();
    let file = write_file(home.path(), "marzo.csv", STATEMENT.as_bytes());
    let output = pulse(home.path())
        .args(["parse", "--json"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"], "success");
    assert_eq!(value["movements"].as_array().unwrap().len(), 3);
    assert_eq!(value["movements"][1]["amount"], -45.1);
    assert_eq!(value["metadata"]["headerRow"], 3);
}

#[test]
fn test_parse_json_failure_is_reported_in_band() {
    let home = tempfile::tempdir().unwrap();
    let file = write_file(home.path(), "notes.csv", b"just;some\nwords;here\n");
    pulse(home.path())
        .args(["parse", "--json"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"failure\""))
        .stdout(predicate::str::contains("\"kind\": \"no_header_found\""));
}

#[test]
fn test_parse_failure_exits_with_error() {
    let home = tempfile::tempdir().unwrap();
    let file = write_file(home.path(), "empty.csv", b"");
    pulse(home.path())
        .arg("parse")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: File is empty"));
}

#[test]
fn test_hash_prints_sha256() {
    let home = tempfile::tempdir().unwrap();
    let file = write_file(home.path(), "abc.csv", b"abc");
    pulse(home.path())
        .arg("hash")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        ))
        .stdout(predicate::str::contains("sha256"));
}

#[test]
fn test_import_rejects_same_file_twice() {
    let home = tempfile::tempdir().unwrap();
    let file = write_file(home.path(), "marzo.csv", STATEMENT.as_bytes());
    pulse(home.path())
        .arg("import")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 imported, 0 skipped"));
    pulse(home.path())
        .arg("import")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));
    pulse(home.path())
        .arg("batches")
        .assert()
        .success()
        .stdout(predicate::str::contains("marzo.csv"));
}

#[test]
fn test_batches_without_ledger() {
    let home = tempfile::tempdir().unwrap();
    pulse(home.path())
        .arg("batches")
        .assert()
        .success()
        .stdout(predicate::str::contains("No batches imported yet"));
}

#[test]
fn test_profiles_lists_builtin_registry() {
    let home = tempfile::tempdir().unwrap();
    pulse(home.path())
        .arg("profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("santander_es"))
        .stdout(predicate::str::contains("generic"));
}

#[test]
fn test_config_init_writes_settings() {
    let home = tempfile::tempdir().unwrap();
    pulse(home.path())
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(built-in)"));
    assert!(home.path().join(".config/pulse/settings.json").exists());
}
