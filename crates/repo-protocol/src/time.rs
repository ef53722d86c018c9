//! Wall-clock helpers that work on native and WASM targets.

use web_time::{SystemTime, UNIX_EPOCH};

/// Current time in milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock reads before the epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
