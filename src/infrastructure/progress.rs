//! Progress forwarding over a bounded channel.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::ports::progress::ProgressReporter;
use crate::domain::values::progress::ProgressUpdate;

/// Pushes updates without ever blocking the planning thread. When the
/// receiver lags, updates are dropped.
pub struct ChannelProgress {
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, update: &ProgressUpdate) {
        match self.tx.try_send(update.clone()) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => tracing::trace!("Progress channel full, dropping update"),
        }
    }
}
