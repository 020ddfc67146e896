//! Source of the current time for batch creation.

use chrono::{DateTime, Utc};

/// Supply the instant recorded as a batch's assignment time.
///
/// Clocks must be `Send + Sync` so a dispatcher can be shared between
/// threads.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
