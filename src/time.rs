//! Monotonic millisecond time, independent of any OS clock.
//!
//! The engine never reads a wall clock itself; every tick is driven by a
//! timestamp the host hands in (see [`crate::engine::Engine::do_events`]).
//! `Instant`/`Duration` stay `no_std`-friendly `u64`-millisecond newtypes so
//! the same engine runs unmodified on a microcontroller's free-running timer
//! or a host's `Instant::now()`.

use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};

/// A point in time, in milliseconds, since an arbitrary but fixed epoch
/// (typically "device boot").
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    millis: u64,
}

impl Instant {
    pub const ZERO: Instant = Instant { millis: 0 };

    pub const fn from_millis(millis: u64) -> Self {
        Instant { millis }
    }

    pub const fn total_millis(&self) -> u64 {
        self.millis
    }

    /// Time elapsed since `earlier`, tolerating a wrapped/overflowed clock by
    /// using wrapping subtraction. The duplicate cache and task deadlines
    /// rely on this to stay correct across `u64` wraparound.
    pub fn saturating_duration_since(&self, earlier: Instant) -> Duration {
        Duration::from_millis(self.millis.wrapping_sub(earlier.millis))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.millis)
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;
    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis.wrapping_add(rhs.millis))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;
    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis.wrapping_sub(rhs.millis))
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;
    fn sub(self, rhs: Instant) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

/// A span of time, in milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    millis: u64,
}

impl Duration {
    pub const ZERO: Duration = Duration { millis: 0 };

    pub const fn from_millis(millis: u64) -> Self {
        Duration { millis }
    }

    pub const fn total_millis(&self) -> u64 {
        self.millis
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.millis)
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration::from_millis(self.millis.wrapping_add(rhs.millis))
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        Duration::from_millis(self.millis.saturating_sub(rhs.millis))
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}
