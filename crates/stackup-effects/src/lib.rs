//! Dry-run aware dispatcher for provisioning side effects.
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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

pub mod dispatcher;
pub mod error;
mod fsops;
pub mod plan;
pub mod runner;

pub use dispatcher::Dispatcher;
pub use error::{EffectError, EffectResult};
pub use plan::{ArgValue, EffectArg, ExecutionMode, Outcome, PlannedEffect};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, InteractiveProcess, SystemCommandRunner};
