// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the remote chat API, the host's transcript
//! files, the singleton lockfile, and terminal-binding files.

pub mod chat;
pub mod env;
pub mod singleton;
pub mod terminal_binding;
pub mod transcript;

pub use chat::{ChatAdapter, ChatError, ChatMessage, TelegramChatAdapter};
pub use singleton::{SingletonError, SingletonGuard};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use chat::{ChatCall, FakeChatAdapter};
