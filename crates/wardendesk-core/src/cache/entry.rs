use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// A value fetched from the API, stamped with when it arrived.
///
/// Freshness is measured on tokio's monotonic clock so tests can drive it
/// with a paused runtime; `cached_at` is wall-clock time for display only.
#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    fetched_at: Instant,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            fetched_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// Valid only while `now - fetched_at < ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}
