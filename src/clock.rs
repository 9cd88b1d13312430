//! Time sources for the session
//!
//! The session only ever asks for two readings: a monotonic offset used for
//! every start/end timestamp, and the wall-clock time used to stamp the
//! session start in exported snapshots.
//!
//! [`SystemClock`] reads the real clocks. [`ManualClock`] is advanced by hand,
//! which makes overlap scenarios reproducible in tests and demos.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic and wall-clock readings
pub trait Clock: Debug + Send + Sync + 'static {
    /// Monotonic reading relative to an arbitrary, fixed origin
    fn monotonic(&self) -> Duration;

    /// Current wall-clock time
    fn wall_time(&self) -> DateTime<Utc>;
}

/// Real clock backed by [`Instant`] and the system wall clock
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock
///
/// Clones share the same reading, so a test can keep one handle while the
/// session owns another. Wall time is the fixed `epoch` plus the current
/// reading.
///
/// # Example
///
/// ```
/// use pipetime::clock::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.monotonic(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
    epoch: DateTime<Utc>,
}

impl ManualClock {
    /// Create a clock reading zero, with wall time anchored at the Unix epoch
    pub fn new() -> Self {
        Self::with_epoch(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Create a clock reading zero, with wall time anchored at `epoch`
    pub fn with_epoch(epoch: DateTime<Utc>) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
            epoch,
        }
    }

    /// Move the reading forward by `delta`
    pub fn advance(&self, delta: Duration) {
        self.nanos.fetch_add(duration_to_nanos(delta), Ordering::SeqCst);
    }

    /// Advance by a whole number of seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Jump to an absolute reading
    ///
    /// Moving backwards is allowed but breaks monotonicity for anything
    /// recorded afterwards.
    pub fn set(&self, reading: Duration) {
        self.nanos.store(duration_to_nanos(reading), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn wall_time(&self) -> DateTime<Utc> {
        let elapsed =
            chrono::Duration::from_std(self.monotonic()).unwrap_or(chrono::Duration::zero());
        self.epoch + elapsed
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.monotonic();
        thread::sleep(Duration::from_millis(5));
        let second = clock.monotonic();
        assert!(second >= first + Duration::from_millis(5));
    }

    #[test]
    fn test_manual_clock_clones_share_reading() {
        let clock = ManualClock::new();
        let handle = clock.clone();

        handle.advance_secs(3);
        assert_eq!(clock.monotonic(), Duration::from_secs(3));

        clock.set(Duration::from_millis(1500));
        assert_eq!(handle.monotonic(), Duration::from_millis(1500));
    }

    #[test]
    fn test_manual_clock_wall_time_follows_reading() {
        let clock = ManualClock::new();
        clock.advance_secs(60);
        assert_eq!(clock.wall_time().timestamp(), 60);
    }
}
