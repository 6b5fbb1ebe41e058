// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-slug and short-token derivation for the session registry.

use std::path::Path;

/// Derive a project slug from a working directory.
///
/// Lowercases the basename, collapses runs of non-alphanumeric characters
/// into a single `-`, and strips any leading/trailing `-`. An empty or
/// unrepresentable basename (e.g. `/`) falls back to `"project"`.
pub fn project_slug(project_dir: &Path) -> String {
    let basename = project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let mut slug = String::with_capacity(basename.len());
    let mut last_was_dash = false;
    for ch in basename.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Generate 4 lowercase hex characters of cryptographically-adequate randomness.
fn random_hex4() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    format!("{:04x}", rng.random_range(0..=0xffffu16))
}

/// Build a short-token from a project slug: `<slug>-<4 hex chars>`.
pub fn short_token(slug: &str) -> String {
    format!("{slug}-{}", random_hex4())
}
