//! Wall-clock port

use chrono::{DateTime, Duration, Utc};

/// Source of the current time for token expiry, profile cache age and
/// message timestamps.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Time elapsed since `earlier`; negative if `earlier` lies ahead.
    fn since(&self, earlier: DateTime<Utc>) -> Duration {
        self.now().signed_duration_since(earlier)
    }
}
