// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-stream transport (component B): accepts hook clients on the
//! well-known Unix-domain socket and frames one JSON object per line in
//! both directions. `permission_request`/`stop_request` connections are
//! parked for an eventual asynchronous reply (§4.2); everything else is
//! answered on the same line-turn.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use crate::protocol::{Request, Response};
use crate::router::{self, RouterOutcome};
use crate::state::Shared;

pub struct Listener {
    socket: UnixListener,
    shared: Arc<Shared>,
}

impl Listener {
    pub fn bind(socket_path: &std::path::Path, shared: Arc<Shared>) -> io::Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _ = std::fs::remove_file(socket_path);
        let socket = UnixListener::bind(socket_path)?;
        Ok(Self { socket, shared })
    }

    /// Accept connections until the process is torn down. Each connection
    /// runs in its own task; accept itself never fails fatally (an error
    /// on one accept attempt is logged and the loop continues).
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _addr)) => {
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, shared).await {
                            debug!(error = %err, "connection closed");
                        }
                    });
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, shared: Arc<Shared>) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(err) => {
                warn!(error = %err, "malformed request line");
                let response = Response::error("", format!("malformed request: {err}"));
                write_response(&mut write_half, &response).await?;
                continue;
            }
        };

        if request.is_blocking() {
            handle_blocking(request, &shared, &mut write_half, &mut lines).await?;
            // The blocking branch owns the connection until resolution;
            // once it returns, the client has closed or been answered.
            return Ok(());
        }

        let response = handle_synchronous(request, &shared);
        write_response(&mut write_half, &response).await?;
    }

    Ok(())
}

/// Park `request`, then race the verdict against the read half observing
/// EOF (the hook process exited or the user resolved it host-side).
async fn handle_blocking(
    request: Request,
    shared: &Arc<Shared>,
    write_half: &mut (impl AsyncWriteExt + Unpin),
    lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>,
) -> io::Result<()> {
    let request_id = request.request_id().to_string();
    let timeout_secs = match &request {
        Request::PermissionRequest { .. } => shared.options.permission_timeout,
        Request::StopRequest { .. } => shared.options.stop_followup_timeout,
        _ => 0,
    };
    let outcome = match request {
        Request::PermissionRequest {
            request_id,
            session_id,
            terminal_id,
            tool_name,
            message,
            transcript_path,
            cwd,
        } => {
            router::handle_permission_request(
                shared,
                request_id,
                session_id,
                terminal_id,
                tool_name,
                message,
                transcript_path,
                cwd,
            )
            .await
        }
        Request::StopRequest {
            request_id,
            session_id,
            terminal_id,
            transcript_path,
            cwd,
        } => {
            router::handle_stop_request(shared, request_id, session_id, terminal_id, transcript_path, cwd).await
        }
        _ => unreachable!("handle_blocking called with a non-blocking request"),
    };

    match outcome {
        RouterOutcome::Immediate(response) => {
            write_response(write_half, &response).await?;
            Ok(())
        }
        RouterOutcome::Parked { rx, closed, message_id } => {
            tokio::select! {
                verdict = rx => {
                    if let Ok(response) = verdict {
                        write_response(write_half, &response).await?;
                    }
                    Ok(())
                }
                eof = lines.next_line() => {
                    closed.store(true, Ordering::Release);
                    info!(request_id, "connection closed while request was parked");
                    match eof {
                        Ok(_) => Ok(()),
                        Err(err) => Err(err),
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(timeout_secs)), if timeout_secs > 0 => {
                    if let Some(response) = router::handle_timeout(shared, &message_id, &request_id).await {
                        write_response(write_half, &response).await?;
                    }
                    Ok(())
                }
            }
        }
    }
}

fn handle_synchronous(request: Request, shared: &Arc<Shared>) -> Response {
    match request {
        Request::EnableAfk { request_id, session_id } => router::handle_enable_afk(shared, request_id, session_id),
        Request::DisableAfk { request_id, session_id } => {
            router::handle_disable_afk(shared, request_id, session_id)
        }
        Request::Status { request_id, session_id } => router::handle_status(shared, request_id, session_id),
        other => Response::error(other.request_id(), "unexpected request on synchronous path"),
    }
}

async fn write_response(write_half: &mut (impl AsyncWriteExt + Unpin), response: &Response) -> io::Result<()> {
    let mut line = serde_json::to_string(response).unwrap_or_else(|_| {
        format!(
            r#"{{"type":"response","request_id":"{}","status":"error"}}"#,
            response.request_id
        )
    });
    line.push('\n');
    write_half.write_all(line.as_bytes()).await
}
