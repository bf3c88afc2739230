use super::IoDevice;
use crate::engine::timer::{Clock, Timer};
use crate::value::Value;
use std::time::Duration;

/// The project timer
#[derive(Debug)]
pub struct ClockDevice {
    project_timer: Timer,
    paused_at: Option<Duration>,
}

impl ClockDevice {
    pub fn new(clock: &Clock) -> Self {
        ClockDevice {
            project_timer: clock.start_timer(),
            paused_at: None,
        }
    }

    /// Seconds since the last reset, frozen while paused
    pub fn project_timer(&self) -> f64 {
        self.paused_at
            .unwrap_or_else(|| self.project_timer.elapsed())
            .as_secs_f64()
    }

    pub fn reset_project_timer(&mut self) {
        self.project_timer.start();
        if self.paused_at.is_some() {
            self.paused_at = Some(Duration::ZERO);
        }
    }

    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(self.project_timer.elapsed());
        }
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.project_timer.set_elapsed(paused_at);
        }
    }
}

impl IoDevice for ClockDevice {
    fn query(&mut self, func: &str, _args: &[Value]) -> Option<Value> {
        match func {
            "projectTimer" => Some(Value::Num(self.project_timer())),
            "resetProjectTimer" => {
                self.reset_project_timer();
                None
            }
            "pause" => {
                self.pause();
                None
            }
            "resume" => {
                self.resume();
                None
            }
            _ => None,
        }
    }
}
