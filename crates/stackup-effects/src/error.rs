//! # Design
//!
//! - Provide structured, constant-message errors for dispatched effects.
//! - Capture the operation, path, or program so a failed step can be replayed by hand.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use stackup_patch::PatchError;
use thiserror::Error;

/// Result type for effect execution.
pub type EffectResult<T> = Result<T, EffectError>;

/// Errors produced while performing side effects.
#[derive(Debug, Error)]
pub enum EffectError {
    /// A configuration file patch failed.
    #[error("effect patch failure")]
    Patch {
        /// File being patched.
        path: PathBuf,
        /// Underlying patch error.
        source: PatchError,
    },
    /// IO failures while interacting with the filesystem or output streams.
    #[error("effect io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures.
    #[error("effect walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Root of the traversal.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Zip archive failures.
    #[error("effect zip failure")]
    Zip {
        /// Operation that triggered the archive failure.
        operation: &'static str,
        /// Archive involved in the failure.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// User lookup failed when changing ownership.
    #[cfg(unix)]
    #[error("effect user lookup failed")]
    UserLookup {
        /// Username that failed lookup.
        user: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Group lookup failed when changing ownership.
    #[cfg(unix)]
    #[error("effect group lookup failed")]
    GroupLookup {
        /// Group name that failed lookup.
        group: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Nix syscall failures.
    #[cfg(unix)]
    #[error("effect nix failure")]
    Nix {
        /// Operation that triggered the nix failure.
        operation: &'static str,
        /// Path involved in the nix failure.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Input validation failures.
    #[error("effect invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Operation not available on this platform.
    #[error("effect operation unsupported")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Optional value that triggered the unsupported error.
        value: Option<String>,
    },
    /// An external program could not be started or talked to.
    #[error("effect command spawn failure")]
    CommandSpawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// An external program exited unsuccessfully.
    #[error("effect command failed")]
    CommandFailed {
        /// Program that failed.
        program: String,
        /// Exit code, absent when the process was killed by a signal.
        status: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}

impl EffectError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }

    #[cfg(unix)]
    pub(crate) fn nix(operation: &'static str, path: impl Into<PathBuf>, source: nix::Error) -> Self {
        Self::Nix {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn spawn(program: &str, source: io::Error) -> Self {
        Self::CommandSpawn {
            program: program.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn effect_error_helpers_build_variants() {
        let io_err = EffectError::io("purge.remove", "/var/www/html", io::Error::other("io"));
        assert!(matches!(io_err, EffectError::Io { .. }));
        assert!(io_err.source().is_some());
        assert_eq!(io_err.to_string(), "effect io failure");

        let zip_err = EffectError::zip(
            "extract_zip.decode",
            "/tmp/omeka.zip",
            zip::result::ZipError::FileNotFound,
        );
        assert!(matches!(zip_err, EffectError::Zip { .. }));

        #[cfg(unix)]
        {
            let nix_err = EffectError::nix("chown", "/tmp", nix::Error::EPERM);
            assert!(matches!(nix_err, EffectError::Nix { .. }));
        }

        let spawn_err = EffectError::spawn("wget", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(spawn_err, EffectError::CommandSpawn { ref program, .. } if program == "wget"));
    }

    #[test]
    fn walkdir_helper_wraps_traversal_errors() {
        let missing = std::env::temp_dir().join("stackup-effects-missing-root");
        let Some(Err(walk_err)) = walkdir::WalkDir::new(&missing).into_iter().next() else {
            panic!("expected walking a missing root to fail");
        };
        let err = EffectError::walkdir("chown_tree.walk", &missing, walk_err);
        assert!(matches!(err, EffectError::Walkdir { .. }));
    }

    #[test]
    fn unsupported_carries_operation_without_source() {
        let err = EffectError::Unsupported {
            operation: "chown",
            value: Some("unix_only".to_string()),
        };
        assert_eq!(err.to_string(), "effect operation unsupported");
        assert!(err.source().is_none());
        assert!(matches!(err, EffectError::Unsupported { operation: "chown", .. }));
    }
}
