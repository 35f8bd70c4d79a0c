use std::cell::Cell;

use chrono::Utc;
use uuid::Uuid;

/// Source of timestamps (milliseconds since the Unix epoch) and fresh task ids.
pub trait Clock {
    fn now_ms(&self) -> i64;

    fn new_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic clock: time only moves when told to, ids come from a counter.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<i64>,
    next: Cell<u64>,
    prefix: String,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self::with_prefix(start_ms, "task")
    }

    pub fn with_prefix(start_ms: i64, prefix: &str) -> Self {
        Self {
            now: Cell::new(start_ms),
            next: Cell::new(1),
            prefix: prefix.to_string(),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.set(self.now.get().saturating_add(delta_ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }

    fn new_id(&self) -> String {
        let n = self.next.get();
        self.next.set(n + 1);
        format!("{}-{n}", self.prefix)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }

    fn new_id(&self) -> String {
        (**self).new_id()
    }
}
