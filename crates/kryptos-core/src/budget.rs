//! Per-request time budget
//!
//! One deadline covers the whole request; every child call clamps its own
//! timeout to the remaining budget and is skipped once the budget is gone.

use std::time::Duration;
use tokio::time::Instant;

/// A fixed point in time the request must not run past
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// The underlying instant, for `sleep_until`
    #[must_use]
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Remaining budget; `None` once expired
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        if now >= self.at {
            None
        } else {
            Some(self.at - now)
        }
    }

    /// True once the budget is exhausted
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// Clamp a child call's timeout to the remaining budget; `None` when no
    /// budget remains and the call must not start
    #[must_use]
    pub fn clamp(&self, timeout: Duration) -> Option<Duration> {
        self.remaining().map(|rest| rest.min(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_deadline_has_budget() {
        let deadline = Deadline::after(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        let remaining = deadline.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(59));
    }

    #[test]
    fn test_zero_budget_expires_immediately() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.is_expired());
        assert!(deadline.clamp(Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_clamp_takes_minimum() {
        let deadline = Deadline::after(Duration::from_secs(2));
        let clamped = deadline.clamp(Duration::from_secs(10)).unwrap();
        assert!(clamped <= Duration::from_secs(2));

        let unclamped = deadline.clamp(Duration::from_millis(1)).unwrap();
        assert_eq!(unclamped, Duration::from_millis(1));
    }
}
