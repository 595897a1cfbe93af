use std::time::Duration;

use crate::Ticks;

/// The master crystal clock a machine's components all tick from.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    #[must_use]
    pub const fn frequency_hz(self) -> u64 {
        self.frequency_hz
    }

    /// Number of ticks in one second divided `frames_per_second` ways.
    #[must_use]
    pub fn ticks_per_frame(self, frames_per_second: u64) -> Ticks {
        Ticks::new(self.frequency_hz / frames_per_second)
    }

    /// Wall-clock duration of one frame, for pacing the scheduler.
    #[must_use]
    pub fn frame_duration(self, frames_per_second: u64) -> Duration {
        Duration::from_secs_f64(1.0 / frames_per_second as f64)
    }
}
