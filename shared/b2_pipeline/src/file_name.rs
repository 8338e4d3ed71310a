//! Storage-name derivation and content hashing

use std::borrow::Cow;
use std::path::Path;

use sha1::{Digest, Sha1};

/// Extension used when the original name has none
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Extension of the caller-side file name, or [`DEFAULT_EXTENSION`]
///
/// Only ASCII alphanumeric extensions are kept, so the derived name is safe to
/// splice into a download URL as is.
#[must_use]
pub fn extension_of(original_name: &str) -> &str {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Storage name for an upload started at `unix_millis`
///
/// Only the extension of `original_name` survives; uniqueness comes from the timestamp.
#[must_use]
pub fn storage_file_name(original_name: &str, unix_millis: i64) -> String {
    format!("file_{unix_millis}.{}", extension_of(original_name))
}

/// Storage name for an upload starting now
#[must_use]
pub fn storage_file_name_now(original_name: &str) -> String {
    storage_file_name(original_name, chrono::Utc::now().timestamp_millis())
}

/// Lowercase hex SHA-1 of `bytes`
#[must_use]
pub fn content_sha1(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Value for the `X-Bz-File-Name` header
///
/// Always percent-encoded; names made of unreserved ASCII pass through unchanged.
#[must_use]
pub fn encode_file_name_header(file_name: &str) -> Cow<'_, str> {
    urlencoding::encode(file_name)
}
