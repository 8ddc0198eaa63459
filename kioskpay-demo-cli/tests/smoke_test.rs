//! Smoke tests for kioskpay-demo-cli
//!
//! These tests run the built binary for commands that need no network
//! access: help, the jurisdiction table, local checks, signing and webhook
//! verification.

use std::io::Write;
use std::process::{Command, Output};

use kioskpay_lib::signing;
use tempfile::NamedTempFile;

fn cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kioskpay-demo"))
        .args(args)
        .env_remove("KIOSKPAY_API_KEY")
        .env_remove("KIOSKPAY_MERCHANT_ID")
        .env_remove("KIOSKPAY_COUNTRY")
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn all_output(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn config_file(country: &str, webhook_secret: Option<&str>) -> NamedTempFile {
    let mut config = serde_json::json!({
        "api_key": "sk_test_cli",
        "merchant_id": "kiosk-cli",
        "country": country,
        "api_endpoint": "http://127.0.0.1:1"
    });
    if let Some(secret) = webhook_secret {
        config["webhook"] = serde_json::json!({ "endpoint": "https://kiosk/hook", "secret": secret });
    }
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(config.to_string().as_bytes()).unwrap();
    file
}

/// Test that the CLI can show help
#[test]
fn test_cli_help() {
    let output = cli(&["--help"]);
    let text = stdout(&output);

    assert!(output.status.success());
    for command in ["jurisdictions", "check", "create", "rates", "verify-webhook", "sign"] {
        assert!(text.contains(command), "Help should mention '{}'", command);
    }
}

/// Test that version is shown
#[test]
fn test_cli_version() {
    let output = cli(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("kioskpay-demo"));
}

#[test]
fn test_jurisdictions_table() {
    let output = cli(&["jurisdictions"]);
    let text = stdout(&output);

    assert!(output.status.success());
    for country in ["Malaysia", "Singapore", "Indonesia", "Thailand", "Brunei", "Cambodia", "Vietnam", "Laos"] {
        assert!(text.contains(country), "missing {}", country);
    }
    assert!(text.contains("SGD"));
}

#[test]
fn test_check_accepts_small_payment() {
    let config = config_file("SG", None);
    let output = cli(&[
        "--config",
        config.path().to_str().unwrap(),
        "check",
        "--amount",
        "25.00",
        "--crypto",
        "BTC",
    ]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("passes local validation"));
}

#[test]
fn test_check_reports_missing_kyc() {
    let config = config_file("SG", None);
    let output = cli(&[
        "--config",
        config.path().to_str().unwrap(),
        "check",
        "--amount",
        "1500",
        "--name",
        "Tan",
    ]);
    assert!(all_output(&output).contains("KYC information (name and email) required"));
}

#[test]
fn test_check_rejects_unsupported_crypto() {
    let config = config_file("MY", None);
    let output = cli(&[
        "--config",
        config.path().to_str().unwrap(),
        "check",
        "--amount",
        "10",
        "--crypto",
        "DOGE",
    ]);
    assert!(all_output(&output).contains("Unsupported cryptocurrency"));
}

#[test]
fn test_sign_matches_library() {
    let output = cli(&["sign", "{\"a\":1}", "--timestamp", "1700000000000", "--secret", "sk"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        signing::sign("{\"a\":1}", "1700000000000", "sk")
    );
}

#[test]
fn test_verify_webhook() {
    let config = config_file("TH", Some("whsec_cli"));
    let body = serde_json::json!({
        "type": "payment.completed",
        "data": { "id": "pay_cli", "status": "completed", "amount": "10", "currency": "THB" }
    })
    .to_string();
    let mut body_file = NamedTempFile::new().unwrap();
    body_file.write_all(body.as_bytes()).unwrap();

    let good = signing::sign_payload(&body, "whsec_cli");
    let output = cli(&[
        "--config",
        config.path().to_str().unwrap(),
        "verify-webhook",
        body_file.path().to_str().unwrap(),
        "--signature",
        &good,
    ]);
    let text = all_output(&output);
    assert!(text.contains("Signature verified"), "{}", text);
    assert!(text.contains("pay_cli"));

    let output = cli(&[
        "--config",
        config.path().to_str().unwrap(),
        "verify-webhook",
        body_file.path().to_str().unwrap(),
        "--signature",
        "00",
    ]);
    assert!(all_output(&output).contains("does not match"));
}

#[test]
fn test_missing_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli(&[
        "--config",
        dir.path().join("missing.json").to_str().unwrap(),
        "get",
        "pay_1",
    ]);
    assert!(!output.status.success());
}
