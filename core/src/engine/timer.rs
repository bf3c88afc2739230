//! Monotonic time source and timers
//!
//! Every time budget in the engine (tick work time, warp time, stack timers,
//! the project timer) reads from a [`Clock`]. Hosts use the system clock;
//! tests use a manual clock they advance explicitly.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Shared time source
#[derive(Debug, Clone)]
pub enum Clock {
    /// Wall-clock time measured from an origin
    System(Instant),
    /// Time that only moves when [`Clock::advance`] is called
    Manual(Rc<Cell<Duration>>),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System(Instant::now())
    }

    pub fn manual() -> Self {
        Clock::Manual(Rc::new(Cell::new(Duration::ZERO)))
    }

    /// Time elapsed since the clock's origin
    pub fn now(&self) -> Duration {
        match self {
            Clock::System(origin) => origin.elapsed(),
            Clock::Manual(now) => now.get(),
        }
    }

    /// Move a manual clock forward. No-op for the system clock.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(now) = self {
            now.set(now.get() + by);
        }
    }

    /// A timer started at the current instant
    pub fn start_timer(&self) -> Timer {
        Timer {
            clock: self.clone(),
            started_at: self.now(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::system()
    }
}

/// Measures time since it was (re)started
#[derive(Debug, Clone)]
pub struct Timer {
    clock: Clock,
    started_at: Duration,
}

impl Timer {
    pub fn start(&mut self) {
        self.started_at = self.clock.now();
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started_at)
    }

    /// Move the start so that `elapsed()` reads `elapsed` right now
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.started_at = self.clock.now().saturating_sub(elapsed);
    }
}
