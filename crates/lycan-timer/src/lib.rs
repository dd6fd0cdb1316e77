//! Phase deadline timer for Lycan.
//!
//! A room in play has exactly one pending deadline: the end of its
//! current phase. [`PhaseTimer`] holds that deadline and resolves
//! [`PhaseTimer::expired`] when it passes. It is one-shot: after firing
//! it stays disarmed until the driver arms the next phase.
//!
//! # Integration
//!
//! The timer sits inside a room driver's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* re-arm, disarm, stop */ }
//!         expiry = timer.expired() => {
//!             // advance the phase whose deadline was `expiry.deadline`
//!         }
//!     }
//! }
//! ```
//!
//! When disarmed, `expired()` pends forever so `select!` only reacts to
//! the other branches.
//!
//! Deadlines are absolute wall-clock instants (`DateTime<Utc>`, the same
//! value stored on the room). They are converted once, when armed, into
//! a Tokio instant, so tests can drive the timer with a paused clock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// Upper bound on a single wait. Keeps far-future deadlines from
/// overflowing the monotonic clock.
const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// A wake-up later than this past the deadline logs a warning.
    pub late_warn: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            late_warn: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Expiry (returned to caller when the deadline passes)
// ---------------------------------------------------------------------------

/// A fired deadline, returned by [`PhaseTimer::expired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    /// The deadline that was armed. Drivers use it as the expected value
    /// of their compare-and-swap, so a stale expiry can never advance a
    /// phase that already moved on.
    pub deadline: DateTime<Utc>,
    /// Arm counter value of the deadline that fired (starts at 1).
    pub generation: u64,
    /// How far past the scheduled instant the task actually woke.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerStats {
    /// Times the timer was armed.
    pub armed: u64,
    /// Times a deadline fired.
    pub fired: u64,
    /// Fired deadlines that woke later than `late_warn`.
    pub late: u64,
    pub max_late: Duration,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Armed {
    deadline: DateTime<Utc>,
    at: TokioInstant,
}

/// One re-armable deadline. One `PhaseTimer` per room driver.
#[derive(Debug)]
pub struct PhaseTimer {
    config: TimerConfig,
    armed: Option<Armed>,
    generation: u64,
    stats: TimerStats,
}

impl PhaseTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            armed: None,
            generation: 0,
            stats: TimerStats::default(),
        }
    }

    /// Arms the timer for an absolute deadline, replacing any previous one.
    ///
    /// A deadline already in the past fires on the next poll.
    pub fn arm_at(&mut self, deadline: DateTime<Utc>) {
        let remaining = (deadline - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(MAX_WAIT);
        self.generation += 1;
        self.stats.armed += 1;
        self.armed = Some(Armed {
            deadline,
            at: TokioInstant::now() + remaining,
        });
        debug!(
            generation = self.generation,
            %deadline,
            remaining_ms = remaining.as_millis() as u64,
            "phase timer armed"
        );
    }

    /// Arms the timer `after` from now and returns the absolute deadline.
    pub fn arm(&mut self, after: Duration) -> DateTime<Utc> {
        let delta = chrono::Duration::from_std(after.min(MAX_WAIT))
            .unwrap_or(chrono::Duration::zero());
        let deadline = Utc::now() + delta;
        self.arm_at(deadline);
        deadline
    }

    /// Drops the pending deadline, if any. Idempotent.
    pub fn disarm(&mut self) {
        if self.armed.take().is_some() {
            debug!(generation = self.generation, "phase timer disarmed");
        }
    }

    /// Waits for the armed deadline and disarms the timer.
    ///
    /// Pends forever while disarmed. Cancel-safe: dropping the future
    /// before it resolves leaves the deadline armed.
    pub async fn expired(&mut self) -> Expiry {
        let Some(armed) = self.armed else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(armed.at).await;

        let late_by = TokioInstant::now().saturating_duration_since(armed.at);
        self.armed = None;
        self.stats.fired += 1;
        if late_by > self.stats.max_late {
            self.stats.max_late = late_by;
        }
        if late_by > self.config.late_warn {
            self.stats.late += 1;
            warn!(
                generation = self.generation,
                deadline = %armed.deadline,
                late_ms = late_by.as_millis() as u64,
                "phase deadline fired late"
            );
        } else {
            trace!(generation = self.generation, "phase deadline fired");
        }

        Expiry {
            deadline: armed.deadline,
            generation: self.generation,
            late_by,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The armed deadline, if any.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.armed.map(|a| a.deadline)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &TimerStats {
        &self.stats
    }
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}
