//! Small helpers shared across the world core.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

