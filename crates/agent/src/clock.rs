use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Time source for run polling, injectable so the deadline can be tested.
#[async_trait]
pub trait PollClock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl PollClock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that advances only when slept on; sleeping returns immediately.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<u32>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self { origin: Instant::now(), elapsed: Mutex::new(Duration::ZERO), sleeps: Mutex::new(0) }
    }
}

impl ManualClock {
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|elapsed| *elapsed).unwrap_or_default()
    }

    pub fn sleep_count(&self) -> u32 {
        self.sleeps.lock().map(|sleeps| *sleeps).unwrap_or_default()
    }
}

#[async_trait]
impl PollClock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
        if let Ok(mut sleeps) = self.sleeps.lock() {
            *sleeps += 1;
        }
    }
}
