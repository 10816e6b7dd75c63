use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::CoreError;

/// Milliseconds since the Unix epoch, as allocated to contexts.
pub type Timestamp = u64;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<Timestamp, CoreError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))?;
    millis(elapsed)
}

fn millis(elapsed: Duration) -> Result<Timestamp, CoreError> {
    u64::try_from(elapsed.as_millis())
        .map_err(|_| CoreError::InvalidData("clock reading does not fit in a timestamp".into()))
}

/// Issues strictly increasing timestamps to any number of threads.
///
/// The wall clock is used while it moves forward; when it stalls or goes
/// backwards the last issued value is bumped by one instead. Callers never
/// observe a duplicate, so ids derived from `(source, timestamp, type)`
/// cannot collide.
#[derive(Debug, Default)]
pub struct TimestampAllocator {
    last: AtomicU64,
}

impl TimestampAllocator {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Resume after a previously issued value, e.g. the newest timestamp
    /// found in a store.
    pub fn starting_after(last: Timestamp) -> Self {
        Self {
            last: AtomicU64::new(last),
        }
    }

    pub fn allocate(&self) -> Timestamp {
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            // A clock before the epoch degrades to pure counting.
            let now = physical_now().unwrap_or(0);
            let next = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(observed) => last = observed,
            }
        }
    }

    pub fn last_issued(&self) -> Timestamp {
        self.last.load(Ordering::Acquire)
    }
}
