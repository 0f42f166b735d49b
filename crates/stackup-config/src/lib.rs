#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Settings, defaults, and server-name validation for provisioning runs.
//!
//! Layout: `defaults.rs` (documented default values), `model.rs` (typed
//! settings and the override merge), `hostname.rs` (server-name resolution),
//! `credentials.rs` (random usernames and passwords).

pub mod credentials;
pub mod defaults;
pub mod error;
pub mod hostname;
pub mod model;

pub use credentials::generate_credential;
pub use error::{ConfigError, ConfigResult};
pub use hostname::{ServerName, ipv4_to_hostname, validate_hostname};
pub use model::{
    CertificateSubject, DatabaseSettings, InstallOptions, Ownership, ReleaseSettings, ServerPaths,
    Settings, SettingsOverrides, SiteSettings, TlsSettings,
};
