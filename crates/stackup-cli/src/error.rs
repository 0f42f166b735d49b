//! CLI error type separating bad input from failed provisioning.

use std::fmt::{self, Display, Formatter};

use stackup_config::ConfigError;
use stackup_provision::ProvisionError;

/// CLI-level error; validation problems exit 2, operational failures exit 3.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

// Field values are left out of the message; some of them are passwords.
impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::InvalidHostname {
                value,
                label: Some(label),
                reason,
            } => Self::validation(format!(
                "invalid server name {value:?}: label {label:?} {}",
                reason.replace('_', " ")
            )),
            ConfigError::InvalidHostname {
                value,
                label: None,
                reason,
            } => Self::validation(format!(
                "invalid server name {value:?}: {}",
                reason.replace('_', " ")
            )),
            ConfigError::InvalidField {
                section,
                field,
                reason,
                ..
            } => Self::validation(format!(
                "invalid setting {section}.{field}: {}",
                reason.replace('_', " ")
            )),
        }
    }
}

impl From<ProvisionError> for CliError {
    fn from(error: ProvisionError) -> Self {
        Self::failure(error)
    }
}
