//! CLI integration tests for the `siad` binary.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout
//! content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::SigningKey;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn siad() -> Command {
    cargo_bin_cmd!("siad")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    siad()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SIAD document archive server"));
}

#[test]
fn version_exits_0() {
    siad()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("siad"));
}

#[test]
fn serve_help_lists_env_flags() {
    siad()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--rate-limit"))
        .stdout(predicate::str::contains("SIAD_SESSION_TTL_SECS"));
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    siad().arg("frobnicate").assert().code(2);
}

// ──────────────────────────────────────────────
// 2. keygen
// ──────────────────────────────────────────────

#[test]
fn keygen_writes_matching_keypair() {
    let tmp = TempDir::new().unwrap();
    let prefix = tmp.path().join("archive");

    siad()
        .args(["keygen", "--output-prefix"])
        .arg(&prefix)
        .assert()
        .success()
        .stdout(predicate::str::contains("archive.secret"))
        .stdout(predicate::str::contains("archive.pub"));

    let secret = fs::read_to_string(tmp.path().join("archive.secret")).unwrap();
    let public = fs::read_to_string(tmp.path().join("archive.pub")).unwrap();
    let seed: [u8; 32] = BASE64.decode(secret.trim()).unwrap().try_into().unwrap();
    let key = SigningKey::from_bytes(&seed);
    assert_eq!(BASE64.encode(key.verifying_key().to_bytes()), public.trim());
}

#[test]
fn keygen_into_missing_directory_exits_1() {
    let tmp = TempDir::new().unwrap();
    let prefix = tmp.path().join("no-such-dir").join("k");
    siad()
        .args(["keygen", "--output-prefix"])
        .arg(&prefix)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error writing key"));
}

// ──────────────────────────────────────────────
// 3. serve argument validation
// ──────────────────────────────────────────────

#[test]
fn serve_with_only_tls_cert_exits_1() {
    siad()
        .args(["serve", "--port", "0", "--tls-cert", "cert.pem"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "--tls-cert and --tls-key must both be provided",
        ));
}

#[test]
fn serve_with_unreadable_signing_key_exits_1() {
    let tmp = TempDir::new().unwrap();
    let key = tmp.path().join("broken.secret");
    fs::write(&key, "not a key").unwrap();
    siad()
        .args(["serve", "--port", "0", "--signing-key"])
        .arg(&key)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Server error"));
}
