// src/progress.rs

use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Receives progress notifications. Implementations must not block.
pub trait Progress: Send + Sync {
    fn advance(&self, n: u64);
    fn describe(&self, label: &str);
}

impl Progress for ProgressBar {
    fn advance(&self, n: u64) {
        self.inc(n);
    }

    fn describe(&self, label: &str) {
        self.set_message(label.to_string());
    }
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn advance(&self, _n: u64) {}
    fn describe(&self, _label: &str) {}
}

/// Shared flag for stopping a migration between file tasks and cluster closes.
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
