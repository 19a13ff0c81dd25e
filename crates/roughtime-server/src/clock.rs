//! Time sources for delegation windows.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time, epoch milliseconds.
///
/// Abstracted so key-rotation logic can be driven by a fixed clock in tests.
pub trait ClockSource {
    /// Milliseconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> u64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis() as u64,
            // A clock before 1970 reads as the epoch itself.
            Err(_) => 0,
        }
    }
}
