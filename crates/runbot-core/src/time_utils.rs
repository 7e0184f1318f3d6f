use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, the unit of event `created_at` fields.
pub fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Caps a peer-supplied timestamp at the local clock.
pub fn clamp_to_now(timestamp: u64) -> u64 {
    timestamp.min(current_unix_timestamp())
}
