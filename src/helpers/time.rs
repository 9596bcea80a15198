use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

use crate::utils::constants::TOKEN_REFRESH_MARGIN_SECS;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Instant at which a token issued at `issued_at` with `expires_in_seconds` lifetime
/// should be renewed. Out-of-range lifetimes make renewal due at `issued_at`.
pub fn refresh_due_at(issued_at: DateTime<Utc>, expires_in_seconds: i64) -> DateTime<Utc> {
    expires_in_seconds
        .checked_sub(TOKEN_REFRESH_MARGIN_SECS)
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .unwrap_or(issued_at)
}

pub fn get_instant() -> Instant {
    Instant::now()
}
