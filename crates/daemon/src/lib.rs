// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! afkd library surface: the local IPC wire protocol and on-disk layout,
//! for use by anything that wants to talk to the daemon (tests, future
//! hook clients) without pulling in the daemon's own runtime.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod paths;
pub mod protocol;

pub use paths::Paths;
pub use protocol::{Request, Response, ResponseKind};
