//! Time sources.
//!
//! The buffer stamps its mtime from an injected clock so tests can pin time.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct SimulatedClock {
    t: Mutex<SystemTime>,
}

impl SimulatedClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            t: Mutex::new(start),
        }
    }

    pub fn set_time(&self, t: SystemTime) {
        *self.t.lock().unwrap_or_else(|e| e.into_inner()) = t;
    }

    pub fn advance_time(&self, d: Duration) {
        let mut t = self.t.lock().unwrap_or_else(|e| e.into_inner());
        *t += d;
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> SystemTime {
        *self.t.lock().unwrap_or_else(|e| e.into_inner())
    }
}
