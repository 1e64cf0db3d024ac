//! Process-wide run span.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the run span entered for the lifetime of the guard.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter a `run` span carrying the run id, mode, and build SHA.
    #[must_use]
    pub fn new(run_id: impl Into<String>, mode: impl Into<String>) -> Self {
        let run_id = run_id.into();
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "run",
            run_id = %run_id,
            mode = %mode,
            build_sha = %build_sha()
        )));
        Self {
            _guard: span.enter(),
        }
    }
}
