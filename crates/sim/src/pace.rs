use std::time::{Duration, Instant};

/// Fixed-rate pacing with drift correction.
///
/// Keeps the start times of the last `capacity` steps in a ring. The next
/// step is due `count * interval` after the oldest recorded start, so a late
/// step shortens the following waits until the window is back on schedule.
#[derive(Debug)]
pub struct Pacer {
    starts: Vec<Instant>,
    capacity: usize,
    index: usize,
    filled: bool,
    interval: Option<Duration>,
}

impl Pacer {
    pub fn new(steps_per_second: f64, capacity: usize) -> Self {
        Self {
            starts: Vec::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            index: 0,
            filled: false,
            interval: interval_for(steps_per_second),
        }
    }

    /// Change the target rate. The window restarts from the next step.
    pub fn set_rate(&mut self, steps_per_second: f64) {
        self.interval = interval_for(steps_per_second);
        self.starts.clear();
        self.index = 0;
        self.filled = false;
    }

    /// `None` when unpaced.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn record(&mut self, start: Instant) {
        if self.filled {
            self.starts[self.index] = start;
        } else {
            self.starts.push(start);
        }
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    pub fn count(&self) -> usize {
        self.starts.len()
    }

    fn oldest(&self) -> Option<Instant> {
        if self.filled {
            self.starts.get(self.index).copied()
        } else {
            self.starts.first().copied()
        }
    }

    fn newest(&self) -> Option<Instant> {
        let last = (self.index + self.capacity - 1) % self.capacity;
        self.starts.get(last).copied()
    }

    /// How long to wait at `now` before the next step is due.
    pub fn wait_time(&self, now: Instant) -> Duration {
        let (Some(interval), Some(oldest)) = (self.interval, self.oldest()) else {
            return Duration::ZERO;
        };
        interval
            .checked_mul(self.count() as u32)
            .and_then(|offset| oldest.checked_add(offset))
            .map_or(MAX_INTERVAL, |due| due.saturating_duration_since(now))
    }

    /// Mean spacing between recorded starts.
    pub fn average_period(&self) -> Duration {
        match (self.oldest(), self.newest()) {
            (Some(oldest), Some(newest)) if self.count() > 1 => {
                newest.saturating_duration_since(oldest) / (self.count() - 1) as u32
            }
            _ => Duration::ZERO,
        }
    }
}

/// Longest spacing between steps; slower rates are clamped to it.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn interval_for(steps_per_second: f64) -> Option<Duration> {
    if !(steps_per_second.is_finite() && steps_per_second > 0.0) {
        return None;
    }
    let interval = Duration::try_from_secs_f64(1.0 / steps_per_second).unwrap_or(MAX_INTERVAL);
    Some(interval.min(MAX_INTERVAL))
}
