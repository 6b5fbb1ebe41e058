//! Daemon lifecycle specs: singleton acquisition and startup artifacts (§4.1).

use crate::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn second_instance_refuses_to_start() {
    let daemon = Daemon::spawn();

    // Spawn a second daemon against the same state dir; it should observe
    // the held lock and exit non-zero rather than run alongside the first.
    let output = std::process::Command::new(afkd_binary_for_test())
        .env("CLAUDE_AFK_STATE_DIR", daemon.state_path())
        .env_remove("CLAUDE_AFK_TELEGRAM_TOKEN")
        .output()
        .expect("second afkd should at least run and exit");

    assert!(
        !output.status.success(),
        "a second daemon instance should refuse to start while the first holds the lock"
    );
}

#[test]
#[serial]
fn lockfile_is_created_and_heartbeats() {
    let daemon = Daemon::spawn();
    assert!(daemon.lock_path().exists(), "daemon should create its lockfile on startup");

    let initial_mtime = std::fs::metadata(daemon.lock_path()).unwrap().modified().unwrap();
    let touched = wait_for(20_000, || {
        std::fs::metadata(daemon.lock_path())
            .and_then(|m| m.modified())
            .map(|mtime| mtime > initial_mtime)
            .unwrap_or(false)
    });
    assert!(touched, "heartbeat should advance the lockfile's mtime within the 15s interval");
}

#[test]
#[serial]
fn startup_writes_a_log_marker() {
    let daemon = Daemon::spawn();
    let found = wait_for(2000, || daemon.log_contents().contains("starting afkd"));
    assert!(found, "expected a startup log line, got: {}", daemon.log_contents());
}

fn afkd_binary_for_test() -> std::path::PathBuf {
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.join("target/debug/afkd")
}
