//! ============================================================================
//! Error Tracker - Bounded in-memory record of captured errors
//! ============================================================================
//! Constructed by the caller and handed to whatever needs to report errors
//! (usually as `Arc<ErrorTracker>`). Every capture is also logged.
//! ============================================================================

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::error;

/// Default number of captured errors retained
pub const DEFAULT_ERROR_CAPACITY: usize = 200;

/// One captured error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedError {
    /// Where it happened, e.g. "gate.tier_lookup"
    pub context: String,
    pub message: String,
    pub captured_at: i64,
}

/// Ring buffer of recent errors; oldest entries drop first
pub struct ErrorTracker {
    entries: Mutex<VecDeque<CapturedError>>,
    capacity: usize,
}

impl ErrorTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Log and record an error
    pub fn capture(&self, context: &str, message: impl Into<String>) {
        let message = message.into();
        error!("[{}] {}", context, message);

        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(CapturedError {
            context: context.to_string(),
            message,
            captured_at: chrono::Utc::now().timestamp(),
        });
    }

    /// Up to `limit` most recent errors, oldest first
    pub fn recent(&self, limit: usize) -> Vec<CapturedError> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<CapturedError>> {
        // A panic while holding the lock leaves the buffer intact.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ErrorTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CAPACITY)
    }
}
