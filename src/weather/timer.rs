/// Millisecond countdown that fires once `current` reaches `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    interval: i64,
    current: i64,
}

impl IntervalTimer {
    pub fn new(interval_ms: i64) -> Self {
        IntervalTimer {
            interval: interval_ms,
            current: 0,
        }
    }

    pub fn update(&mut self, diff_ms: i64) {
        self.current += diff_ms;
        if self.current < 0 {
            self.current = 0;
        }
    }

    pub fn passed(&self) -> bool {
        self.current >= self.interval
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn set_current(&mut self, current_ms: i64) {
        self.current = current_ms;
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn set_interval(&mut self, interval_ms: i64) {
        self.interval = interval_ms;
    }
}
