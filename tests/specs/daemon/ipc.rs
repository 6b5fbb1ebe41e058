//! Local IPC protocol specs (§6.1): wire-level request/response round
//! trips against a real running daemon, with no chat configured.

use crate::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn enable_then_status_round_trips() {
    let daemon = Daemon::spawn();
    let mut conn = daemon.connect();

    let resp = conn.request(&enable_afk("r1", "s1"));
    assert_eq!(resp["status"], "enabled");
    assert_eq!(resp["request_id"], "r1");

    let resp = conn.request(&status("r2", "s1"));
    assert_eq!(resp["status"], "status_response");
    assert_eq!(resp["daemon_running"], true);
    assert_eq!(resp["telegram_configured"], false);
    assert_eq!(
        resp["afk_sessions"].as_array().unwrap(),
        &[serde_json::Value::String("s1".into())]
    );

    let resp = conn.request(&disable_afk("r3", "s1"));
    assert_eq!(resp["status"], "disabled");

    let resp = conn.request(&status("r4", "s1"));
    assert!(resp["afk_sessions"].as_array().unwrap().is_empty());
}

#[test]
#[serial]
fn permission_request_without_afk_falls_through() {
    let daemon = Daemon::spawn();
    let mut conn = daemon.connect();

    let tmp = tempfile::tempdir().unwrap();
    let transcript = tmp.path().join("t.jsonl");
    std::fs::write(&transcript, "").unwrap();

    let resp = conn.request(&permission_request("r1", "s1", &transcript, tmp.path()));
    assert_eq!(resp["status"], "not_enabled");
    assert_eq!(resp["request_id"], "r1");
}

#[test]
#[serial]
fn permission_request_with_afk_but_no_chat_is_not_configured() {
    let daemon = Daemon::spawn();
    let mut conn = daemon.connect();

    conn.request(&enable_afk("r0", "s1"));

    let tmp = tempfile::tempdir().unwrap();
    let transcript = tmp.path().join("t.jsonl");
    std::fs::write(&transcript, "").unwrap();

    let resp = conn.request(&permission_request("r1", "s1", &transcript, tmp.path()));
    assert_eq!(resp["status"], "not_configured");
}

#[test]
#[serial]
fn stop_request_with_afk_but_no_chat_is_not_configured() {
    let daemon = Daemon::spawn();
    let mut conn = daemon.connect();

    conn.request(&enable_afk("r0", "s1"));

    let tmp = tempfile::tempdir().unwrap();
    let transcript = tmp.path().join("t.jsonl");
    std::fs::write(&transcript, "").unwrap();

    let resp = conn.request(&stop_request("r1", "s1", &transcript, tmp.path()));
    assert_eq!(resp["status"], "not_configured");
}

#[test]
#[serial]
fn malformed_request_line_gets_an_error_response_without_closing_the_connection() {
    let daemon = Daemon::spawn();
    let mut conn = daemon.connect();

    let resp = conn.request_raw_line("not json at all");
    assert_eq!(resp["status"], "error");

    // The connection should still be usable afterwards.
    let resp = conn.request(&status("r2", "s1"));
    assert_eq!(resp["status"], "status_response");
}

#[test]
#[serial]
fn independent_connections_do_not_interfere() {
    let daemon = Daemon::spawn();
    let mut a = daemon.connect();
    let mut b = daemon.connect();

    a.request(&enable_afk("a1", "session-a"));
    let resp = b.request(&status("b1", "session-b"));
    assert_eq!(
        resp["afk_sessions"].as_array().unwrap(),
        &[serde_json::Value::String("session-a".into())]
    );
}
