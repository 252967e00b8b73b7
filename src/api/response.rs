//! Process-wide response behavior toggles.

use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ERRORS: AtomicBool = AtomicBool::new(false);

/// Include internal error detail in 500 responses. Enabled outside
/// production so local debugging does not require log access.
pub fn enable_debug_errors(enabled: bool) {
    DEBUG_ERRORS.store(enabled, Ordering::Relaxed);
}

#[must_use]
pub fn debug_errors() -> bool {
    DEBUG_ERRORS.load(Ordering::Relaxed)
}
