//! Cooperative cancellation shared between the CLI and the scanner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable flag. Tripping any clone cancels them all.
/// Checked by the scanner between files; nothing is interrupted mid-read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Shared flag.
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        return Self::default();
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        return self.flag.load(Ordering::SeqCst);
    }
}
