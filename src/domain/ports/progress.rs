//! Progress reporting port.
//!
//! Reporters are invoked synchronously from whichever stage is running,
//! including evaluation worker threads, so implementations must be cheap
//! and must never block.

use crate::domain::values::progress::ProgressUpdate;

pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

impl<F> ProgressReporter for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Forwards to the reporter when one is attached; `None` is a no-op.
pub fn emit(progress: Option<&dyn ProgressReporter>, update: ProgressUpdate) {
    if let Some(reporter) = progress {
        reporter.report(&update);
    }
}
