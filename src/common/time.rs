use chrono::Utc;

/// Get current unix timestamp (seconds)
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// Deadline helper: now + window seconds
pub fn deadline_after(window_secs: u64) -> u64 {
    current_timestamp() + window_secs
}
