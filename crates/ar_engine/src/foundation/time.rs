//! Time management utilities

use std::time::{Duration, Instant};

/// Simple stopwatch for measuring processing time against a budget
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Stopwatch {
    /// Create a stopwatch that starts immediately
    pub fn start_new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Get the elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get the elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }

    /// Check whether more than `budget` has elapsed
    pub fn exceeded(&self, budget: Duration) -> bool {
        self.elapsed() > budget
    }
}

/// Fixed-rate ticker for display-paced work
///
/// Deadlines advance in whole periods from the start instant. When a tick is
/// serviced late by more than one period the missed deadlines are skipped
/// (and counted) instead of being replayed back to back.
#[derive(Debug)]
pub struct CadenceTimer {
    period: Duration,
    next_deadline: Instant,
    ticks: u64,
    missed: u64,
}

impl CadenceTimer {
    /// Create a timer ticking `hz` times per second, first tick due now
    pub fn new(hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(hz.max(1)));
        Self {
            period,
            next_deadline: Instant::now(),
            ticks: 0,
            missed: 0,
        }
    }

    /// Period between ticks
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left until the next deadline (zero if already due)
    pub fn time_until_next(&self) -> Duration {
        self.next_deadline.saturating_duration_since(Instant::now())
    }

    /// Sleep until the next deadline, then advance it
    ///
    /// `max_sleep` bounds a single sleep so callers can re-check a stop flag.
    /// Returns `true` when a tick is due, `false` if the sleep was cut short.
    pub fn wait_for_tick(&mut self, max_sleep: Duration) -> bool {
        let remaining = self.time_until_next();
        if remaining > max_sleep {
            std::thread::sleep(max_sleep);
            return false;
        }
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        self.advance(Instant::now());
        true
    }

    /// Advance the deadline past `now`, counting skipped periods
    fn advance(&mut self, now: Instant) {
        self.ticks += 1;
        self.next_deadline += self.period;
        while self.next_deadline <= now {
            self.next_deadline += self.period;
            self.missed += 1;
        }
    }

    /// Number of ticks serviced
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Number of deadlines skipped because a tick was serviced late
    pub fn missed_ticks(&self) -> u64 {
        self.missed
    }
}
