//! Wall-clock abstraction.
//!
//! Cooldowns, backup folder names, and device-authorisation polling all read
//! the current time through [`Clock`] so tests can drive time explicitly.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of the current time and a way to wait.
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Folder name used for backups taken at `at`, e.g. `20250118-093012`.
#[must_use]
pub fn backup_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}
