use std::thread;
use std::time::{Duration, Instant};

/// Paces a loop at a fixed rate. Deadlines advance by whole periods so
/// small oversleeps do not accumulate.
pub struct TickScheduler {
    period: Duration,
    next_deadline: Instant,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self::starting_at(period, Instant::now())
    }

    pub fn starting_at(period: Duration, start: Instant) -> Self {
        let period = period.max(Duration::from_micros(100));
        TickScheduler {
            period,
            next_deadline: start + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleeps until the next tick is due and returns the instant it woke.
    pub fn wait(&mut self) -> Instant {
        let now = Instant::now();
        if let Some(remaining) = self.next_deadline.checked_duration_since(now) {
            thread::sleep(remaining);
        }
        let woke = Instant::now();
        self.schedule_after(woke);
        woke
    }

    fn schedule_after(&mut self, woke: Instant) {
        self.next_deadline += self.period;
        // Fell more than a period behind: skip the missed ticks instead of
        // bursting through them.
        if self.next_deadline + self.period < woke {
            self.next_deadline = woke + self.period;
        }
    }
}

/// Counts ticks and reports the rate roughly once per second.
pub struct TickCounter {
    last_update_time: Instant,
    ticks_since_last_update: u32,
}

impl TickCounter {
    pub fn new() -> Self {
        TickCounter {
            last_update_time: Instant::now(),
            ticks_since_last_update: 0,
        }
    }

    /// Call once per tick. Returns `Some(ticks)` once a second has passed.
    pub fn update(&mut self) -> Option<u32> {
        self.update_at(Instant::now())
    }

    fn update_at(&mut self, now: Instant) -> Option<u32> {
        self.ticks_since_last_update += 1;
        if now.duration_since(self.last_update_time) < Duration::from_secs(1) {
            return None;
        }

        let rate = self.ticks_since_last_update;
        self.ticks_since_last_update = 0;
        self.last_update_time += Duration::from_secs(1);
        if self.last_update_time < now - Duration::from_secs(1) {
            self.last_update_time = now;
        }
        Some(rate)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlines_advance_by_whole_periods() {
        let start = Instant::now();
        let period = Duration::from_millis(10);
        let mut scheduler = TickScheduler::starting_at(period, start);
        scheduler.schedule_after(start + Duration::from_millis(11));
        assert_eq!(scheduler.next_deadline, start + Duration::from_millis(20));
    }

    #[test]
    fn falling_far_behind_resets_deadline() {
        let start = Instant::now();
        let period = Duration::from_millis(10);
        let mut scheduler = TickScheduler::starting_at(period, start);
        let woke = start + Duration::from_millis(100);
        scheduler.schedule_after(woke);
        assert_eq!(scheduler.next_deadline, woke + period);
    }

    #[test]
    fn wait_paces_the_loop() {
        let period = Duration::from_millis(5);
        let mut scheduler = TickScheduler::new(period);
        let start = Instant::now();
        for _ in 0..4 {
            scheduler.wait();
        }
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn counter_reports_once_per_second() {
        let mut counter = TickCounter::new();
        let base = counter.last_update_time;
        assert_eq!(counter.update_at(base + Duration::from_millis(300)), None);
        assert_eq!(counter.update_at(base + Duration::from_millis(600)), None);
        assert_eq!(counter.update_at(base + Duration::from_millis(1000)), Some(3));
        assert_eq!(counter.update_at(base + Duration::from_millis(1100)), None);
    }
}
