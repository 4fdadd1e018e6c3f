//! Time utilities and constants for ratewise.

use chrono::{DateTime, Duration, Utc};

/// Rate resolution timing constants.
pub mod constants {
    use super::Duration;

    /// How long a fetched rate table is trusted (24 hours).
    pub fn cache_ttl() -> Duration {
        Duration::hours(24)
    }

    /// Upper bound on a single live fetch (10 seconds).
    pub fn fetch_timeout() -> Duration {
        Duration::seconds(10)
    }
}

/// A timestamp with timezone (always UTC for ratewise).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check if a timestamp has expired, inclusive of the expiry instant itself.
pub fn is_expired_at(expiry: Timestamp, at: Timestamp) -> bool {
    at >= expiry
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// A clock that only moves when told to.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct ManualClock {
    current: parking_lot::Mutex<Timestamp>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: parking_lot::Mutex::new(start),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, at: Timestamp) {
        *self.current.lock() = at;
    }

    /// Move forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_expired_at_boundary() {
        let expiry = now();
        assert!(is_expired_at(expiry, expiry));
        assert!(is_expired_at(expiry, expiry + Duration::seconds(1)));
        assert!(!is_expired_at(expiry, expiry - Duration::seconds(1)));
    }

    #[test]
    fn test_manual_clock() {
        let start = now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::hours(25));
        assert_eq!(clock.now(), start + Duration::hours(25));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_duration_as_std() {
        assert_eq!(constants::fetch_timeout().as_std(), std::time::Duration::from_secs(10));
        assert_eq!(Duration::seconds(-5).as_std(), std::time::Duration::ZERO);
    }
}
