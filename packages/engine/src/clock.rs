//! Wall-clock source for presence sessions.
//!
//! Timers themselves run on `tokio::time`, which supports cancellation by drop
//! and paused time in tests. The clock only answers "what time is it" for the
//! timestamps written to the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use beacon_entity::Timestamp;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of session timestamps
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// Clock anchored to the system time at construction and advanced by the
/// tokio clock, so it follows `tokio::time::pause`/`advance` in tests.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor_wall: Timestamp,
    anchor: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self { anchor_wall: Utc::now(), anchor: Instant::now() }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }
}

/// Manually driven clock with millisecond resolution.
///
/// Clones share the same time, so a test can hold one copy and hand another
/// to the engine.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { millis: Arc::new(AtomicI64::new(start.timestamp_millis())) }
    }

    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.timestamp_millis(), Ordering::Release);
    }

    pub fn advance(&self, by: std::time::Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(by, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        DateTime::<Utc>::from_timestamp_millis(self.millis.load(Ordering::Acquire)).unwrap_or_default()
    }
}
