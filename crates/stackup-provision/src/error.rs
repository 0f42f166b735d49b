//! # Design
//!
//! - Tag every failure with the provisioning step that produced it.
//! - Keep the effect error as the source so the full chain reaches the CLI.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use stackup_effects::EffectError;
use thiserror::Error;

/// Result type for provisioning procedures.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Named stages of a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// PHP hardening.
    HardenPhp,
    /// MySQL hardening.
    HardenMysql,
    /// CMS download and install.
    InstallCms,
    /// Upload directory lockdown.
    HardenUploads,
    /// Apache restart.
    RestartApache,
    /// Self-signed TLS setup.
    ConfigureTls,
}

impl Step {
    /// Stable label used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HardenPhp => "harden_php",
            Self::HardenMysql => "harden_mysql",
            Self::InstallCms => "install_cms",
            Self::HardenUploads => "harden_uploads",
            Self::RestartApache => "restart_apache",
            Self::ConfigureTls => "configure_tls",
        }
    }
}

impl Display for Step {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors produced by provisioning procedures.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A step failed; nothing after it ran.
    #[error("provisioning step failed")]
    Step {
        /// Step that failed.
        step: Step,
        /// Underlying effect error.
        source: EffectError,
    },
}

impl ProvisionError {
    /// Step that failed.
    #[must_use]
    pub const fn step(&self) -> Step {
        match self {
            Self::Step { step, .. } => *step,
        }
    }
}
