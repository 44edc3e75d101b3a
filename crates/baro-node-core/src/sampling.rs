use core::fmt::Debug;

use log::warn;

use crate::sensors::Sensor;

/// Outcome of one [`Sampler::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample<R> {
    pub readings: R,
    /// `false` when the read failed and `readings` is the last good value
    pub fresh: bool,
}

/// Polls a sensor and keeps the last good readings across failed reads.
///
/// Failures are counted and logged, never retried.
pub struct Sampler<R> {
    last: Option<R>,
    consecutive_failures: u32,
    total_failures: u32,
    total_polls: u32,
}

impl<R: Copy> Default for Sampler<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Copy> Sampler<R> {
    pub const fn new() -> Self {
        Self {
            last: None,
            consecutive_failures: 0,
            total_failures: 0,
            total_polls: 0,
        }
    }

    /// Read `sensor` once.
    ///
    /// Returns `None` only while no read has ever succeeded.
    pub fn poll<S, const COUNT: usize>(&mut self, sensor: &mut S) -> Option<Sample<R>>
    where
        S: Sensor<COUNT, Readings = R>,
        S::Error: Debug,
    {
        self.total_polls = self.total_polls.saturating_add(1);
        match sensor.read() {
            Ok(readings) => {
                self.last = Some(readings);
                self.consecutive_failures = 0;
                Some(Sample {
                    readings,
                    fresh: true,
                })
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.total_failures = self.total_failures.saturating_add(1);
                warn!(
                    "Sensor read failed ({} in a row): {:?}",
                    self.consecutive_failures, e
                );
                self.last.map(|readings| Sample {
                    readings,
                    fresh: false,
                })
            }
        }
    }

    pub fn last(&self) -> Option<&R> {
        self.last.as_ref()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_failures(&self) -> u32 {
        self.total_failures
    }

    pub fn total_polls(&self) -> u32 {
        self.total_polls
    }
}
