// Time Provider Port (for testability)

/// Milliseconds in one day, used for retention windows
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// `days` whole days before `now_millis`, or `None` if that is not representable
pub fn days_before(now_millis: i64, days: i64) -> Option<i64> {
    days.checked_mul(MILLIS_PER_DAY)
        .and_then(|span| now_millis.checked_sub(span))
}

/// Render epoch milliseconds as RFC 3339 (UTC)
pub fn to_rfc3339(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Manually driven clock. Every read advances by `step` so that
    /// consecutive enqueues get strictly increasing timestamps.
    pub struct MockTimeProvider {
        now: AtomicI64,
        step: i64,
    }

    impl MockTimeProvider {
        pub fn new(start_millis: i64) -> Self {
            Self::with_step(start_millis, 0)
        }

        pub fn with_step(start_millis: i64, step: i64) -> Self {
            Self {
                now: AtomicI64::new(start_millis),
                step,
            }
        }

        pub fn set(&self, millis: i64) {
            self.now.store(millis, Ordering::SeqCst);
        }

        pub fn advance(&self, millis: i64) {
            self.now.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl TimeProvider for MockTimeProvider {
        fn now_millis(&self) -> i64 {
            self.now.fetch_add(self.step, Ordering::SeqCst)
        }
    }
}
