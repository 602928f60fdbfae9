//! When an unpopulated instance stops simulating.
//!
//! An instance is awake while sessions are present. When the last one
//! leaves, a sleep request is recorded with the time of that unregister;
//! once the grace period has fully elapsed the instance counts as sleeping.
//! Any registration clears the request, and the next empty moment starts
//! a new grace period from scratch.
//!
//! ```text
//!   Awake ──(last session leaves)──→ SleepRequested ──(grace elapsed)──→ Sleeping
//!     ↑                                   │                                 │
//!     └──────────(session registers)──────┴─────────────────────────────────┘
//! ```

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct IdleState {
    grace: Duration,
    sleep_requested_at: Option<Instant>,
}

impl IdleState {
    /// A fresh instance has nobody in it, so it starts with a sleep request
    /// dated at its creation.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            sleep_requested_at: Some(Instant::now()),
        }
    }

    /// A session arrived: cancel any pending or completed sleep.
    pub fn wake(&mut self) {
        self.sleep_requested_at = None;
    }

    /// The last session left at `now`.
    pub fn request_sleep(&mut self, now: Instant) {
        self.sleep_requested_at = Some(now);
    }

    pub fn is_sleep_requested(&self) -> bool {
        self.sleep_requested_at.is_some()
    }

    pub fn is_sleeping(&self, now: Instant) -> bool {
        self.sleep_requested_at
            .is_some_and(|at| now.saturating_duration_since(at) >= self.grace)
    }
}
