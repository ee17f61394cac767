//! Single-shot timer callout
//!
//! Holds at most one pending deadline. The owner polls it from the run
//! loop; arming again replaces the previous deadline.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerCallout {
    deadline: Option<Instant>,
}

impl TimerCallout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `delay` after `now`
    pub fn set_relative(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    /// Fire at `deadline`
    pub fn set_absolute(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return true if the deadline has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of a set of optional deadlines
pub fn earliest<I>(deadlines: I) -> Option<Instant>
where
    I: IntoIterator<Item = Option<Instant>>,
{
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_fire() {
        let now = Instant::now();
        let mut timer = TimerCallout::new();
        assert!(!timer.is_pending());

        timer.set_relative(now, Duration::from_secs(4));
        assert!(timer.is_pending());
        assert!(!timer.fire_if_due(now + Duration::from_secs(3)));
        assert!(timer.fire_if_due(now + Duration::from_secs(4)));
        assert!(!timer.is_pending());
        // Single shot
        assert!(!timer.fire_if_due(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_rearm_replaces() {
        let now = Instant::now();
        let mut timer = TimerCallout::new();
        timer.set_relative(now, Duration::from_secs(1));
        timer.set_absolute(now + Duration::from_secs(10));
        assert!(!timer.fire_if_due(now + Duration::from_secs(2)));
        assert_eq!(timer.deadline(), Some(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_cancel() {
        let now = Instant::now();
        let mut timer = TimerCallout::new();
        timer.set_relative(now, Duration::ZERO);
        timer.cancel();
        assert!(!timer.fire_if_due(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_earliest() {
        let now = Instant::now();
        let later = now + Duration::from_secs(5);
        assert_eq!(earliest([None, Some(later), Some(now)]), Some(now));
        assert_eq!(earliest([None, None]), None);
    }
}
