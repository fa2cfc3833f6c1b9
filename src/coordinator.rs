//! Cancellation and activity tracking for one conversion run.
//!
//! Deliberately not a process-wide singleton (spec.md §9): every call to
//! `convert` owns its own `Arc<ConversionCoordinator>`, so two
//! conversions can run side by side without interfering with each
//! other's cancellation state.

use crate::error::{ConvertError, ConvertResult};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct ConversionCoordinator {
    active: AtomicBool,
    cancelled: AtomicBool,
}

impl ConversionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn end(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Requests cancellation. Safe to call from any thread at any time,
    /// including before a conversion has started or after it finished.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancellation checkpoint: every loop in introspection, DDL
    /// emission, and row copy calls this between units of work.
    pub fn check_cancelled(&self) -> ConvertResult<()> {
        if self.is_cancelled() {
            Err(ConvertError::Cancelled)
        } else {
            Ok(())
        }
    }
}
