use crate::error::DocumentParseError;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared flag a host can flip to abandon a document load between pages.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<(), DocumentParseError> {
        if self.is_cancelled() {
            return Err(DocumentParseError::Cancelled { stage });
        }
        Ok(())
    }
}
