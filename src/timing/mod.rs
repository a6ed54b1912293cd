//! Monotonic capture clock for presentation timestamps

use std::sync::Arc;
use std::time::Instant;

use crate::types::Timestamp;

/// Monotonic clock for presentation timestamps
///
/// All capture timestamps derive from this single source
/// so that frames arrive in non-decreasing pts order.
#[derive(Debug, Clone)]
pub struct PtsClock {
    start: Arc<Instant>,
}

impl PtsClock {
    /// Create a new clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Create a clock from an existing start instant
    ///
    /// Use this to share the same timebase between components.
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Elapsed time since clock creation as a timestamp
    #[inline]
    pub fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.start.elapsed().as_micros() as i64)
    }

    /// Timestamp for a given instant (must not precede the clock start)
    #[inline]
    pub fn at(&self, instant: Instant) -> Timestamp {
        Timestamp::from_micros(instant.duration_since(*self.start).as_micros() as i64)
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for PtsClock {
    fn default() -> Self {
        Self::new()
    }
}
