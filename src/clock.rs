use std::fmt;

use crate::constants::NANOS_PER_SEC;

/// Simulated system clock.
///
/// Ordering is lexicographic on `(seconds, nanoseconds)`, which is the
/// comparison used for LRU selection and I/O deadlines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimClock {
    pub seconds: u32,
    pub nanoseconds: u32,
}

impl SimClock {
    pub const ZERO: SimClock = SimClock { seconds: 0, nanoseconds: 0 };

    /// Build a normalized clock value.
    pub fn new(seconds: u32, nanoseconds: u32) -> Self {
        let mut clock = SimClock { seconds, nanoseconds: 0 };
        clock.advance(0, nanoseconds);
        clock
    }

    /// Add the deltas and fold nanosecond overflow into seconds.
    ///
    /// The seconds field saturates at `u32::MAX`.
    pub fn advance(&mut self, seconds: u32, nanoseconds: u32) {
        let total = self.nanoseconds as u64 + nanoseconds as u64;
        let carry = (total / NANOS_PER_SEC as u64) as u32;
        self.seconds = self.seconds.saturating_add(seconds).saturating_add(carry);
        self.nanoseconds = (total % NANOS_PER_SEC as u64) as u32;
    }

    pub fn advance_ns(&mut self, nanos: u64) {
        let seconds = u32::try_from(nanos / NANOS_PER_SEC as u64).unwrap_or(u32::MAX);
        let nanoseconds = (nanos % NANOS_PER_SEC as u64) as u32;
        self.advance(seconds, nanoseconds);
    }

    /// The time `nanos` from now, leaving `self` untouched.
    pub fn plus_ns(self, nanos: u64) -> Self {
        let mut later = self;
        later.advance_ns(nanos);
        later
    }

    #[inline]
    pub fn as_nanos(&self) -> u64 {
        self.seconds as u64 * NANOS_PER_SEC as u64 + self.nanoseconds as u64
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.as_nanos() as f64 / NANOS_PER_SEC as f64
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seconds, self.nanoseconds)
    }
}
