//! Text patch engine for configuration files.
//!
//! Every operation reads a whole file, rewrites it in memory, and replaces it
//! atomically. Replacements report a [`MatchCount`] that never exceeds the
//! requested bound or the number of matches present in the original text.
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

pub mod error;
mod file;
mod spec;

pub use error::{PatchError, PatchResult};
pub use file::{append, apply, comment_out_matching, literal_replace, regex_replace};
pub use spec::{DEFAULT_COMMENT_MARKER, MatchCount, PatchOp, PatchSpec, Transformed};
