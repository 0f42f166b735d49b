//! # Design
//!
//! - Provide structured, constant-message errors for patch operations.
//! - Capture the target path and operation so a failed run can be reproduced.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors produced by the text patch engine.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The target file could not be read, staged, or replaced.
    #[error("patch io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A match pattern failed to compile.
    #[error("patch pattern invalid")]
    Pattern {
        /// Pattern that failed to compile.
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// The patch request itself was malformed.
    #[error("patch invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// The caller asserted a match count that the file did not produce.
    #[error("patch unexpected match count")]
    UnexpectedMatchCount {
        /// Path of the file that was being patched.
        path: PathBuf,
        /// Count the caller required.
        expected: usize,
        /// Count the operation produced.
        actual: usize,
    },
}

impl PatchError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn pattern(pattern: &str, source: regex::Error) -> Self {
        Self::Pattern {
            pattern: pattern.to_string(),
            source,
        }
    }
}
