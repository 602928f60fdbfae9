//! Fixed-interval tick scheduler for Realmforge.
//!
//! Drives periodic simulation such as a map instance's entity life cycle
//! (every 400 ms by default), with budget monitoring, overrun handling and
//! pause/resume. A paused scheduler costs nothing: its
//! [`TickScheduler::wait_for_tick`] future simply never resolves.
//!
//! # Integration
//!
//! The scheduler sits inside a `tokio::select!` loop next to whatever can
//! wake it up again:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = wake.notified() => scheduler.resume(),
//!         info = scheduler.wait_for_tick() => {
//!             if instance.is_sleeping() {
//!                 scheduler.pause();
//!                 continue;
//!             }
//!             instance.advance(info.tick);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires later than scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and resume from now.
    #[default]
    Skip,
    /// Fire missed ticks back to back, up to `max_catchup` of them.
    CatchUp {
        /// Hard cap on consecutive catch-up ticks.
        max_catchup: u32,
    },
    /// Keep the original cadence; the next tick fires when it was always
    /// going to.
    Drop,
}

/// Full configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `None` means the scheduler never fires.
    pub interval: Option<Duration>,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Fraction of the interval (0.0–1.0) above which a tick's own run
    /// time logs a warning.
    pub budget_warn_threshold: f64,
    /// Fraction of the interval (0.0–1.0) above which it logs as critical.
    pub budget_critical_threshold: f64,
    /// Track average and max tick run time.
    pub metrics_enabled: bool,
    /// Upper bound of the random delay added to the first tick, so that
    /// instances created together don't tick in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: None,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
            initial_jitter: Duration::from_millis(2),
        }
    }
}

impl TickConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(5);

    /// A config that ticks every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Default::default()
        }
    }

    /// A config that never ticks.
    pub fn never() -> Self {
        Self::default()
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`TickScheduler::new`]:
    /// - `interval` raised to at least [`Self::MIN_INTERVAL`].
    /// - Thresholds clamped to `0.0..=1.0`, warn ≤ critical.
    pub fn validated(mut self) -> Self {
        if let Some(interval) = self.interval {
            if interval < Self::MIN_INTERVAL {
                warn!(
                    interval_ms = interval.as_secs_f64() * 1000.0,
                    min_ms = Self::MIN_INTERVAL.as_secs_f64() * 1000.0,
                    "tick interval below minimum, clamping"
                );
                self.interval = Some(Self::MIN_INTERVAL);
            }
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// The configured interval. Simulation should step by this, not by
    /// wall-clock time.
    pub dt: Duration,
    /// `true` if this tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Ticks dropped because of the overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics, updated by [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of tick run time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last tick's run time divided by the interval. Above 1.0 is an overrun.
    pub budget_utilization: f64,
    /// How many times the scheduler was paused.
    pub total_pauses: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick scheduler. One per simulated instance.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: Option<TokioInstant>,
    /// When the current tick's work started. Set by `wait_for_tick`,
    /// consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    paused: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler. The first tick fires one interval plus a
    /// random jitter from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let next_tick = config.interval.map(|interval| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max))
            };
            TokioInstant::now() + interval + jitter
        });

        match config.interval {
            None => debug!("tick scheduler created without interval"),
            Some(interval) => debug!(
                interval_ms = interval.as_secs_f64() * 1000.0,
                policy = ?config.policy,
                "tick scheduler created"
            ),
        }

        Self {
            config,
            tick_count: 0,
            next_tick,
            tick_start: None,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    /// Creates a scheduler ticking every `interval` with default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(TickConfig::every(interval))
    }

    /// Waits until the next tick is due.
    ///
    /// Never resolves while paused or without an interval; `tokio::select!`
    /// keeps servicing its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, interval) = match (self.next_tick, self.config.interval) {
            (Some(next), Some(interval)) if !self.paused => (next, interval),
            _ => return std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let behind = (late_by.as_nanos() / interval.as_nanos()) as u64;
        let mut ticks_skipped = 0u64;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun && behind > 0 {
                    ticks_skipped = behind;
                    warn!(
                        tick = self.tick_count,
                        skipped = behind,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, skipping ahead"
                    );
                }
                now + interval
            }
            TickPolicy::CatchUp { max_catchup } => {
                if overrun && behind > 0 {
                    ticks_skipped = behind.saturating_sub(max_catchup as u64);
                    warn!(
                        tick = self.tick_count,
                        behind,
                        skipping = ticks_skipped,
                        "tick overrun, catching up (cap {max_catchup})"
                    );
                }
                if behind <= max_catchup as u64 {
                    next + interval
                } else {
                    now + interval
                }
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping cadence"
                    );
                }
                next + interval
            }
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: interval,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the current tick's work as finished, for budget monitoring.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if let Some(budget) = self.config.interval {
            let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
            self.metrics.budget_utilization = utilization;

            if utilization >= self.config.budget_critical_threshold {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    "tick exceeded its interval"
                );
            } else if utilization >= self.config.budget_warn_threshold {
                warn!(
                    tick = self.tick_count,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    "tick approaching its interval"
                );
            }
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_tick_time {
                self.metrics.max_tick_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.tick_start = None;
            self.metrics.total_pauses += 1;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resumes after a pause. The next tick fires one full interval from
    /// now, so time spent paused never turns into a burst of ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(interval) = self.config.interval {
                self.next_tick = Some(TokioInstant::now() + interval);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the scheduler has no interval and never fires.
    pub fn is_idle_only(&self) -> bool {
        self.config.interval.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn interval(&self) -> Option<Duration> {
        self.config.interval
    }
}
