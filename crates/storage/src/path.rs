//! Object key validation.
//!
//! Object keys are arbitrary strings chosen by whoever wrote to the bucket.
//! Before one becomes a local path it must be validated so a hostile key
//! cannot escape the mirror directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates an object key for use as a relative local path.
/// Ensures that keys don't escape the bucket directory (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidKey`](crate::error::ErrorKind::InvalidKey)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use s3scan_storage::validate_key;
/// // Valid keys
/// assert!(validate_key("logs/2024/01/app.log").is_ok());
/// assert!(validate_key("a/../file.txt").is_ok()); // (never leaves bucket directory)
/// // Invalid keys
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a/../../b").is_err());
/// assert!(validate_key("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(
///     validate_key("/backups//./db.sql/").unwrap(),
///     Path::new("backups/db.sql")
/// );
/// ```
pub fn validate(key: &str) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in Path::new(key).components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
                components.push(s)
            },
            // A leading slash in a key is just part of the name.
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(components.into_iter().collect()),
    }
}
