//! pm_io: ingestion boundary and local file I/O for the projection engine.
//!
//! - `records`: lenient raw rows (JSON, JSON Lines, CSV) → strict `PollRecord`, with a drop report
//! - `loader`: config, weight table, priors, polls, and manifest orchestration
//! - `manifest`: one-file description of every input path (offline only)
//! - `canonical_json`: sorted-key JSON with atomic writes
//! - `hasher`: SHA-256 digests of inputs and artifacts
//!
//! Nothing here fetches from the network. Any path that looks like a URL is
//! rejected before it reaches the filesystem.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for pm_io.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (open, create_dir_all, rename, fsync).
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON deserialization errors with a JSON-Pointer-ish location.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// CSV poll exports that cannot be read as a table of poll rows.
    #[error("csv error: {0}")]
    Csv(String),

    /// Hashing failures (read errors while digesting).
    #[error("hash error: {0}")]
    Hash(String),

    /// Configuration parsed but failed domain validation.
    #[error("config error: {0}")]
    Config(String),

    /// A path that would require network access.
    #[error("offline policy: {0}")]
    Offline(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json reports line/column, not a pointer.
        IoError::Json {
            pointer: format!("line {} column {}", e.line(), e.column()),
            msg: e.to_string(),
        }
    }
}

impl From<pm_core::CoreError> for IoError {
    fn from(e: pm_core::CoreError) -> Self {
        IoError::Config(e.to_string())
    }
}

/// Returns true if `s` looks like a URL (any `<scheme>://`, plus bare `http:`/`https:`).
#[inline]
pub fn looks_like_url(s: &str) -> bool {
    let t = s.trim();
    t.contains("://") || t.starts_with("http:") || t.starts_with("https:")
}

pub mod canonical_json;
pub mod hasher;
pub mod loader;
pub mod manifest;
pub mod records;

pub mod prelude {
    pub use crate::loader::{load_all, load_all_from_manifest, LoadedInputs};
    pub use crate::records::{DropReason, IngestReport};
    pub use crate::{looks_like_url, IoError, IoResult};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection() {
        assert!(looks_like_url("https://example.org/polls.json"));
        assert!(looks_like_url(" file:///tmp/x.json"));
        assert!(looks_like_url("http:polls.json"));
        assert!(!looks_like_url("data/polls.json"));
        assert!(!looks_like_url("C:\\data\\polls.json"));
    }

    #[test]
    fn json_error_carries_location() {
        let e: IoError = serde_json::from_str::<serde_json::Value>("{\n  \"a\": }")
            .unwrap_err()
            .into();
        match e {
            IoError::Json { pointer, .. } => assert!(pointer.starts_with("line 2")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
