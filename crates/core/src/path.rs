//! Prefix arithmetic over the flat key namespace.
//!
//! Backends have no directories, only keys that happen to share a prefix, so
//! everything here is pure string manipulation.

use crate::error::{Result, StorageError};

pub const DELIMITER: &str = "/";

/// Turns a directory-style path into a listing prefix: ends with `/`, never
/// starts with one. The root (`""` or `"/"`) maps to the empty prefix.
pub fn normalize_prefix(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

/// Path of `key` relative to `base`, using `/` separators.
///
/// Fails with [`StorageError::Path`] when `key` does not live under `base`, or
/// when the remainder contains `.`, `..` or empty components that could
/// resolve outside a local destination directory. A trailing `/` (directory
/// marker) is preserved.
pub fn relative_path(key: &str, base: &str) -> Result<String> {
    let base = normalize_prefix(base);
    let rel = key
        .strip_prefix(base.as_str())
        .ok_or_else(|| path_error(key, &base))?;

    let body = rel.strip_suffix('/').unwrap_or(rel);
    if !body.is_empty()
        && body
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(path_error(key, &base));
    }
    Ok(rel.to_string())
}

/// Last `/`-separated component of a key.
pub fn base_name(key: &str) -> &str {
    let key = key.strip_suffix('/').unwrap_or(key);
    key.rsplit('/').next().unwrap_or(key)
}

fn path_error(key: &str, base: &str) -> StorageError {
    StorageError::Path {
        key: key.to_string(),
        base: base.to_string(),
    }
}
