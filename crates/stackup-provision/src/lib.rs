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

//! Provisioning procedures for a PHP/MySQL CMS host behind Apache.
//!
//! Layout: `provisioner.rs` (step sequencing and shared patch helpers),
//! `php.rs` (runtime hardening), `cms.rs` (release install and database
//! wiring), `apache.rs` (upload lockdown), `tls.rs` (self-signed HTTPS).

pub mod apache;
pub mod cms;
pub mod error;
pub mod php;
mod provisioner;
pub mod tls;

pub use error::{ProvisionError, ProvisionResult, Step};
pub use php::{PHP_DIRECTIVES, PhpDirective};
pub use provisioner::{ProvisionSummary, Provisioner};
