// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[tokio::test]
async fn acquire_succeeds_and_writes_pid() {
    let dir = tempdir().unwrap();
    let lock_path = dir.path().join("daemon.lock");

    let guard = acquire(&lock_path).unwrap();
    let contents = std::fs::read_to_string(&lock_path).unwrap();
    assert_eq!(contents.trim(), std::process::id().to_string());
    drop(guard);
}

#[tokio::test]
async fn second_acquire_fails_while_first_is_held() {
    let dir = tempdir().unwrap();
    let lock_path = dir.path().join("daemon.lock");

    let _first = acquire(&lock_path).unwrap();
    let second = acquire(&lock_path);
    assert!(matches!(second, Err(SingletonError::AlreadyRunning)));
}

#[tokio::test]
async fn lock_is_released_on_drop() {
    let dir = tempdir().unwrap();
    let lock_path = dir.path().join("daemon.lock");

    let first = acquire(&lock_path).unwrap();
    drop(first);

    let second = acquire(&lock_path);
    assert!(second.is_ok());
}
