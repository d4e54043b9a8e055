//! HTTP cache validation module
//!
//! `ETag` generation for static assets and `If-None-Match` handling.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate a strong `ETag` from content length and hash
///
/// Returns a quoted tag, e.g. `"1a-9f86d081884c7d65"`.
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}-{:x}\"", content.len(), hasher.finish())
}

/// Check the client's `If-None-Match` against the current `ETag`
///
/// Uses weak comparison: `W/"abc"` matches `"abc"`. Accepts a comma
/// separated list and the `*` wildcard.
///
/// Returns true if the client copy is current (respond 304).
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let current = strip_weak(etag);
    if_none_match.is_some_and(|header| {
        header.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || strip_weak(candidate) == current
        })
    })
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
