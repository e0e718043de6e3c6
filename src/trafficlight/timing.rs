/*
 * How long a traffic light stays in one phase.
 *
 * Every cycle gets a fresh duration, drawn uniformly from [min, max] at
 * millisecond resolution. Lights that share a road would otherwise settle
 * into lock-step.
 */

use core::time::Duration;
use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::error::SignalError;

pub const DEFAULT_MIN_CYCLE_MILLIS: u64 = 4000;
pub const DEFAULT_MAX_CYCLE_MILLIS: u64 = 6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    min: Duration,
    max: Duration,
}

impl CycleTiming {
    pub fn new(min: Duration, max: Duration) -> Result<Self, SignalError> {
        if min.as_millis() == 0 || min > max {
            return Err(SignalError::InvalidTiming { min, max });
        }
        Ok(CycleTiming { min, max })
    }

    pub fn from_millis(min: u64, max: u64) -> Result<Self, SignalError> {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let millis = Uniform::new_inclusive(millis_of(self.min), millis_of(self.max));
        Duration::from_millis(millis.sample(rng))
    }
}

impl Default for CycleTiming {
    fn default() -> Self {
        CycleTiming {
            min: Duration::from_millis(DEFAULT_MIN_CYCLE_MILLIS),
            max: Duration::from_millis(DEFAULT_MAX_CYCLE_MILLIS),
        }
    }
}

fn millis_of(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
