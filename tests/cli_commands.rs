use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn netclip() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netclip"));
    cmd.env_remove("NETCLIP_HANDOFF_URL")
        .env_remove("NETCLIP_BUS_TIMEOUT_MS")
        .env("RUST_LOG", "warn");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout is a JSON document")
}

#[test]
fn config_show_reflects_file_and_environment() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("netclip.yaml");
    fs::write(&path, "flow:\n  stage_timeout_ms: 750\n").unwrap();

    let assert = netclip()
        .env("NETCLIP_HANDOFF_URL", "https://proofs.test/new")
        .args(["--output", "json", "--config"])
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success();

    let payload = stdout_json(assert.get_output());
    assert_eq!(payload["flow"]["stage_timeout_ms"], 750);
    assert_eq!(payload["flow"]["handoff_url"], "https://proofs.test/new");
    assert_eq!(payload["tap"]["fetch_bodies"], true);
}

#[test]
fn replay_finds_text_in_recorded_headers() {
    let dir = tempdir().unwrap();
    let events = dir.path().join("events.json");
    fs::write(
        &events,
        r#"[
  {"phase":"beforeSendHeaders","url":"https://api.test/quota","timeStamp":1.0,
   "type":"xmlhttprequest","method":"GET"},
  {"phase":"headersReceived","url":"https://api.test/quota","timeStamp":2.0,
   "type":"xmlhttprequest","statusCode":200,
   "responseHeaders":[{"name":"X-Remaining-Quota","value":"118 calls"}]},
  {"phase":"completed","url":"https://api.test/quota","timeStamp":3.0,
   "type":"xmlhttprequest","statusCode":200}
]"#,
    )
    .unwrap();

    let assert = netclip()
        .args(["--output", "json", "--config"])
        .arg(dir.path().join("absent.yaml"))
        .arg("replay")
        .arg("--events")
        .arg(&events)
        .args(["--search", "118 calls"])
        .assert()
        .success();

    let payload = stdout_json(assert.get_output());
    assert_eq!(payload["events"], 3);
    assert_eq!(payload["deliveries"], 3);
    assert_eq!(payload["reply"]["found"], true);
    assert_eq!(payload["reply"]["matchingRequest"]["url"], "https://api.test/quota");
    assert_eq!(payload["reply"]["matchingRequest"]["statusCode"], 200);
}

#[test]
fn replay_rejects_malformed_events() {
    let dir = tempdir().unwrap();
    let events = dir.path().join("events.json");
    fs::write(&events, "{\"not\": \"an array\"}").unwrap();

    netclip()
        .args(["--config"])
        .arg(dir.path().join("absent.yaml"))
        .arg("replay")
        .arg("--events")
        .arg(&events)
        .args(["--search", "x"])
        .assert()
        .failure();
}

#[test]
fn demo_reports_a_filled_form() {
    let dir = tempdir().unwrap();
    let assert = netclip()
        .args(["--output", "json", "--config"])
        .arg(dir.path().join("absent.yaml"))
        .args(["demo", "--load-delay-ms", "10"])
        .assert()
        .success();

    let payload = stdout_json(assert.get_output());
    assert_eq!(payload["activation"]["outcome"], "handed_off");
    assert_eq!(payload["handoff"]["outcome"], "sequenced");
    assert_eq!(payload["form"]["step"], "details");
    assert_eq!(payload["form"]["application_name"], "Network Request Proof");
}
