use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{Datelike, Local};

use super::Season;

/// Source of the in-world calendar date.
pub trait GameClock: Send + Sync {
    /// Zero-based day of the year (0 = January 1st).
    fn day_of_year(&self) -> u32;

    fn season(&self) -> Season {
        Season::from_day_of_year(self.day_of_year())
    }
}

/// Game time follows the server's local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl GameClock for SystemClock {
    fn day_of_year(&self) -> u32 {
        Local::now().ordinal0()
    }
}

/// A calendar that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    day: AtomicU32,
}

impl ManualClock {
    pub fn new(day_of_year: u32) -> Self {
        ManualClock {
            day: AtomicU32::new(day_of_year % 366),
        }
    }

    pub fn set_day(&self, day_of_year: u32) {
        self.day.store(day_of_year % 366, Ordering::Relaxed);
    }

    /// Move forward, wrapping at the end of a 365-day year.
    pub fn advance_days(&self, days: u32) {
        let day = self.day.load(Ordering::Relaxed) as u64;
        self.day
            .store(((day + days as u64) % 365) as u32, Ordering::Relaxed);
    }
}

impl GameClock for ManualClock {
    fn day_of_year(&self) -> u32 {
        self.day.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_in_year_range() {
        assert!(SystemClock.day_of_year() < 366);
    }

    #[test]
    fn manual_clock_reports_season() {
        let clock = ManualClock::new(78);
        assert_eq!(clock.season(), Season::Spring);
        clock.set_day(169);
        assert_eq!(clock.season(), Season::Summer);
    }

    #[test]
    fn manual_clock_wraps_year() {
        let clock = ManualClock::new(360);
        clock.advance_days(10);
        assert_eq!(clock.day_of_year(), 5);
        assert_eq!(clock.season(), Season::Winter);
    }

    #[test]
    fn manual_clock_advances_by_huge_steps() {
        let clock = ManualClock::new(300);
        clock.advance_days(u32::MAX);
        // 4294967295 % 365 = 250
        assert_eq!(clock.day_of_year(), 185);

        clock.set_day(365);
        clock.advance_days(u32::MAX);
        assert_eq!(clock.day_of_year(), 250);
    }
}
