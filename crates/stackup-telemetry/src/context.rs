//! Run-level span context.
//!
//! # Design
//! - A single root span carries the run id, execution mode, and build identifier.
//! - The span is leaked and kept entered for the remainder of the process.

use tracing::{Span, span::Entered};
use uuid::Uuid;

use crate::init::build_sha;

/// Guard that keeps the run span entered for the lifetime of the process.
pub struct RunContextGuard {
    run_id: Uuid,
    _guard: Entered<'static>,
}

impl RunContextGuard {
    /// Enter a `run` span tagged with a fresh run id and `mode`.
    #[must_use]
    pub fn new(mode: &str) -> Self {
        let run_id = Uuid::new_v4();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "run",
            run_id = %run_id,
            mode = %mode,
            build_sha = %build_sha()
        )));
        Self {
            run_id,
            _guard: span.enter(),
        }
    }

    /// Identifier attached to every event of this run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }
}
