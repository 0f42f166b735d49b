//! Error types for settings resolution.

use thiserror::Error;

/// Primary error type for settings resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The server argument is not a usable hostname.
    #[error("invalid hostname")]
    InvalidHostname {
        /// Hostname after any IP conversion.
        value: String,
        /// Offending label, when the failure is label specific.
        label: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

/// Convenience alias for settings results.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    pub(crate) fn hostname(value: &str, label: Option<&str>, reason: &'static str) -> Self {
        Self::InvalidHostname {
            value: value.to_string(),
            label: label.map(str::to_string),
            reason,
        }
    }

    pub(crate) fn field(
        section: &'static str,
        field: &'static str,
        value: &str,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            section,
            field,
            value: Some(value.to_string()),
            reason,
        }
    }
}
