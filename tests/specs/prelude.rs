//! Test helpers for `afkd` black-box specs.
//!
//! These tests spawn the real `afkd` binary and talk to it exactly as a
//! hook process would: framed line-delimited JSON over the Unix-domain
//! socket under an isolated state directory (`CLAUDE_AFK_STATE_DIR`). No
//! bot token is set in these tests, so the remote-chat adapter is always
//! `not_configured` — every permission/stop path that needs a live chat is
//! covered by the daemon crate's own unit tests against `FakeChatAdapter`.
//! This suite covers what only the real binary can prove: process startup,
//! the singleton lock, and the wire protocol end to end.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

pub const SPEC_POLL_INTERVAL_MS: u64 = 20;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

fn binary_path() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug/afkd");
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join("afkd");
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Poll a condition until it returns true or the timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

/// A running `afkd` instance under an isolated state directory. Killed on drop.
pub struct Daemon {
    child: Option<Child>,
    state_dir: tempfile::TempDir,
}

impl Daemon {
    /// Spawn `afkd` with a fresh, isolated state directory and no chat
    /// token configured. Waits for the socket to appear before returning.
    pub fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    pub fn spawn_with_env(extra_env: &[(&str, &str)]) -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        let mut cmd = Command::new(binary_path());
        cmd.env("CLAUDE_AFK_STATE_DIR", state_dir.path())
            .env_remove("CLAUDE_AFK_TELEGRAM_TOKEN")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in extra_env {
            cmd.env(key, value);
        }
        let child = cmd.spawn().expect("afkd should spawn");

        let socket_path = state_dir.path().join("daemon.sock");
        let appeared = wait_for(SPEC_WAIT_MAX_MS, || socket_path.exists());
        assert!(appeared, "daemon socket never appeared at {socket_path:?}");

        Self {
            child: Some(child),
            state_dir,
        }
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.path().join("daemon.sock")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.path().join("daemon.lock")
    }

    pub fn log_contents(&self) -> String {
        std::fs::read_to_string(self.state_dir.path().join("logs/daemon.log")).unwrap_or_default()
    }

    /// Open a fresh IPC connection to this daemon.
    pub fn connect(&self) -> IpcConn {
        let stream = UnixStream::connect(self.socket_path()).expect("should connect to daemon socket");
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        IpcConn { stream, reader }
    }

    /// Exit code of the child, if it has already exited.
    pub fn try_wait(&mut self) -> Option<i32> {
        self.child
            .as_mut()
            .and_then(|c| c.try_wait().ok().flatten())
            .and_then(|status| status.code())
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// One framed JSON request/response connection to a running daemon.
pub struct IpcConn {
    stream: UnixStream,
    reader: BufReader<UnixStream>,
}

impl IpcConn {
    /// Send one JSON request line and read back one JSON response line.
    pub fn request(&mut self, request: &serde_json::Value) -> serde_json::Value {
        let mut line = serde_json::to_string(request).unwrap();
        line.push('\n');
        self.stream.write_all(line.as_bytes()).unwrap();

        let mut response_line = String::new();
        self.reader
            .read_line(&mut response_line)
            .expect("should read a response line");
        serde_json::from_str(&response_line).expect("response should be valid JSON")
    }

    /// Send a raw, unparsed line (for malformed-input specs) and read back
    /// one JSON response line.
    pub fn request_raw_line(&mut self, raw: &str) -> serde_json::Value {
        let mut line = raw.to_string();
        line.push('\n');
        self.stream.write_all(line.as_bytes()).unwrap();

        let mut response_line = String::new();
        self.reader
            .read_line(&mut response_line)
            .expect("should read a response line");
        serde_json::from_str(&response_line).expect("response should be valid JSON")
    }

    /// Close the write half so the daemon observes EOF on this connection.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

pub fn permission_request(request_id: &str, session_id: &str, transcript_path: &Path, cwd: &Path) -> serde_json::Value {
    serde_json::json!({
        "type": "permission_request",
        "request_id": request_id,
        "session_id": session_id,
        "terminal_id": "t1",
        "tool_name": "Bash",
        "message": "echo hi",
        "transcript_path": transcript_path,
        "cwd": cwd,
    })
}

pub fn stop_request(request_id: &str, session_id: &str, transcript_path: &Path, cwd: &Path) -> serde_json::Value {
    serde_json::json!({
        "type": "stop_request",
        "request_id": request_id,
        "session_id": session_id,
        "terminal_id": "t1",
        "transcript_path": transcript_path,
        "cwd": cwd,
    })
}

pub fn enable_afk(request_id: &str, session_id: &str) -> serde_json::Value {
    serde_json::json!({ "type": "enable_afk", "request_id": request_id, "session_id": session_id })
}

pub fn disable_afk(request_id: &str, session_id: &str) -> serde_json::Value {
    serde_json::json!({ "type": "disable_afk", "request_id": request_id, "session_id": session_id })
}

pub fn status(request_id: &str, session_id: &str) -> serde_json::Value {
    serde_json::json!({ "type": "status", "request_id": request_id, "session_id": session_id })
}
