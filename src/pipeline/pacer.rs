use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::sleep;

use super::Shutdown;

/// Target throughput in messages per second. Zero is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRate(NonZeroU32);

impl MessageRate {
    pub fn new(per_second: NonZeroU32) -> Self {
        Self(per_second)
    }

    pub fn per_second(&self) -> u32 {
        self.0.get()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.0.get()
    }
}

/// Open-loop pacing: a fixed sleep after every operation, with no
/// compensation for the time the operation itself took.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    pub fn new(rate: MessageRate) -> Self {
        Self {
            interval: rate.interval(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps for one interval. Returns `false` if shutdown fired first.
    pub async fn pause(&self, shutdown: &mut Shutdown) -> bool {
        if shutdown.is_triggered() {
            return false;
        }

        tokio::select! {
            _ = sleep(self.interval) => true,
            _ = shutdown.wait() => false,
        }
    }
}
