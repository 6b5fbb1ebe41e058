// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `afkd` — the AFK coordination daemon.
//!
//! Architecture: three cooperating background tasks share one [`state::Shared`]
//! context behind an `Arc` — the local-stream [`listener::Listener`] accept
//! loop, the [`dispatcher::Dispatcher`] polling the remote chat, and the
//! [`watcher::Watcher`] re-scanning transcripts. Singleton lock liveness is
//! its own heartbeat task owned by [`afkd_adapters::singleton`].

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod dispatcher;
mod env;
mod lifecycle;
mod listener;
mod parked;
mod paths;
mod protocol;
mod router;
mod session_registry;
mod state;
mod watcher;

use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::dispatcher::{Dispatcher, TickOutcome};
use crate::lifecycle::{LifecycleError, StartupResult};
use crate::listener::Listener;
use crate::watcher::Watcher;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("afkd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: afkd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let paths_preview = env::state_dir()
        .map(paths::Paths::new)
        .ok_or(LifecycleError::NoStateDir)?;
    rotate_log_if_needed(&paths_preview.log_file());
    write_startup_marker(&paths_preview)?;
    let _log_guard = setup_logging(&paths_preview)?;

    info!("starting afkd");

    let StartupResult { shared, guard, paths } = match lifecycle::startup().await {
        Ok(result) => result,
        Err(LifecycleError::AlreadyRunning) => {
            eprintln!("afkd is already running");
            std::process::exit(1);
        }
        Err(err) => {
            write_startup_error(&paths_preview, &err);
            error!(error = %err, "failed to start afkd");
            return Err(Box::new(err));
        }
    };

    let listener = Listener::bind(&paths.socket_path, shared.clone())?;
    let listener_task = tokio::spawn(listener.run());

    let chat_poll_interval = Duration::from_secs(shared.options.polling_interval.max(1));
    let mut dispatcher = Dispatcher::new(shared.clone());
    let dispatcher_task = tokio::spawn(async move {
        let mut ticker = interval(chat_poll_interval);
        loop {
            ticker.tick().await;
            if matches!(dispatcher.tick().await, TickOutcome::ShouldShutDown) {
                std::process::exit(0);
            }
        }
    });

    let transcript_polling = shared.options.transcript_polling.clone();
    let watcher = Watcher::new(shared.clone());
    let watcher_task = tokio::spawn(async move {
        if !transcript_polling.enabled {
            info!("transcript polling disabled via config.json, watcher loop not started");
            return;
        }
        let mut ticker = interval(Duration::from_millis(transcript_polling.interval_ms.max(1)));
        loop {
            ticker.tick().await;
            watcher.tick().await;
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    listener_task.abort();
    dispatcher_task.abort();
    watcher_task.abort();
    drop(guard);

    info!("afkd shut down cleanly");
    Ok(())
}

fn print_help() {
    println!("afkd {}", env!("CARGO_PKG_VERSION"));
    println!("AFK coordination daemon — bridges blocked hook processes to a remote chat.");
    println!();
    println!("USAGE:");
    println!("    afkd");
    println!();
    println!("afkd is a singleton background process, normally started by the hook");
    println!("scripts on first use. It listens on a Unix socket for permission and");
    println!("stop requests and should not be invoked directly by end users.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

const STARTUP_MARKER_PREFIX: &str = "--- afkd: starting (pid: ";

fn write_startup_marker(paths: &paths::Paths) -> Result<(), LifecycleError> {
    use std::io::Write;

    std::fs::create_dir_all(&paths.logs_dir)?;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(paths.log_file())?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

fn write_startup_error(paths: &paths::Paths, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(paths.log_file()) else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start afkd: {error}");
}

fn setup_logging(paths: &paths::Paths) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&paths.logs_dir)?;

    let file_appender = tracing_appender::rolling::never(&paths.logs_dir, "daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if env::debug_enabled() { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
