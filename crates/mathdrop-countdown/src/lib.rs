//! Pre-match countdown timer for Mathdrop.
//!
//! A [`Countdown`] is a single-shot, cancellable tick sequence:
//! `3` immediately on [`Countdown::start`], then `2`, `1` and finally
//! [`Tick::Go`] at a fixed interval, after which it goes idle again.
//!
//! # Integration
//!
//! The countdown is designed to sit inside the session actor's
//! `tokio::select!` loop, next to the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* may call countdown.cancel() */ }
//!         tick = countdown.wait_for_tick() => { /* feed tick to the session */ }
//!     }
//! }
//! ```
//!
//! Because the actor is the only task touching the countdown, cancelling
//! is just clearing the pending deadline. Once [`Countdown::cancel`]
//! returns, no tick from the aborted sequence can be observed.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownConfig {
    /// First value shown. The sequence is `from, from-1, ..., 1, Go`.
    pub from: u32,
    /// Delay between consecutive ticks.
    pub interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            from: 3,
            interval: Duration::from_millis(1000),
        }
    }
}

impl CountdownConfig {
    /// Smallest accepted interval.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Clamp any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Countdown::new`]. Rules:
    /// - `from` is at least 1 (a countdown that starts at `Go` is no countdown).
    /// - `interval` is at least [`Self::MIN_INTERVAL`].
    pub fn validated(mut self) -> Self {
        if self.from == 0 {
            warn!("countdown `from` is 0, clamping to 1");
            self.from = 1;
        }
        if self.interval < Self::MIN_INTERVAL {
            warn!(interval = ?self.interval, "countdown interval too small, clamping");
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// One step of the countdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// A numeric step (`3`, `2`, `1` with the default config).
    Count(u32),
    /// The terminal step. The countdown is idle again once this is returned.
    Go,
}

impl Tick {
    /// Returns `true` for the terminal [`Tick::Go`].
    pub fn is_go(&self) -> bool {
        matches!(self, Self::Go)
    }
}

/// Errors from countdown control calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CountdownError {
    /// `start` was called while a sequence is still scheduled.
    #[error("countdown already running at {remaining}")]
    AlreadyRunning { remaining: u32 },
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Lifetime counters for one countdown instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountdownMetrics {
    /// Sequences started.
    pub started: u64,
    /// Sequences that reached [`Tick::Go`].
    pub completed: u64,
    /// Sequences cancelled before reaching [`Tick::Go`].
    pub cancelled: u64,
    /// Ticks handed out, including the immediate first one.
    pub ticks_emitted: u64,
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// A live sequence: the value last emitted and when the next tick is due.
#[derive(Debug, Clone, Copy)]
struct Run {
    current: u32,
    deadline: Instant,
}

/// Cancellable, restartable countdown.
///
/// At most one sequence is scheduled at a time; [`start`](Self::start)
/// refuses to overlap a running one.
#[derive(Debug)]
pub struct Countdown {
    config: CountdownConfig,
    run: Option<Run>,
    metrics: CountdownMetrics,
}

impl Countdown {
    /// Create an idle countdown from config.
    pub fn new(config: CountdownConfig) -> Self {
        let config = config.validated();
        debug!(from = config.from, interval = ?config.interval, "countdown created");
        Self {
            config,
            run: None,
            metrics: CountdownMetrics::default(),
        }
    }

    /// Start a new sequence and return its first tick immediately.
    ///
    /// The next tick becomes due one interval from now.
    pub fn start(&mut self) -> Result<Tick, CountdownError> {
        if let Some(run) = self.run {
            return Err(CountdownError::AlreadyRunning {
                remaining: run.current,
            });
        }

        let from = self.config.from;
        self.run = Some(Run {
            current: from,
            deadline: Instant::now() + self.config.interval,
        });
        self.metrics.started += 1;
        self.metrics.ticks_emitted += 1;
        debug!(from, "countdown started");
        Ok(Tick::Count(from))
    }

    /// Cancel the running sequence, if any.
    ///
    /// Returns `true` if a sequence was actually cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.run.take() {
            Some(run) => {
                self.metrics.cancelled += 1;
                debug!(remaining = run.current, "countdown cancelled");
                true
            }
            None => false,
        }
    }

    /// Wait until the next tick is due and return it.
    ///
    /// When idle this future pends forever, so a `select!` loop simply
    /// keeps serving its other branches. Dropping the future before it
    /// resolves leaves the sequence untouched.
    pub async fn wait_for_tick(&mut self) -> Tick {
        let Some(run) = self.run else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(run.deadline).await;

        self.metrics.ticks_emitted += 1;
        if run.current <= 1 {
            self.run = None;
            self.metrics.completed += 1;
            debug!("countdown complete");
            return Tick::Go;
        }

        let current = run.current - 1;
        // Keep the original cadence even if this wakeup was late.
        self.run = Some(Run {
            current,
            deadline: run.deadline + self.config.interval,
        });
        trace!(current, "countdown tick");
        Tick::Count(current)
    }

    /// Whether a sequence is scheduled.
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// The value most recently emitted by the running sequence.
    pub fn remaining(&self) -> Option<u32> {
        self.run.map(|run| run.current)
    }

    /// The (validated) configuration.
    pub fn config(&self) -> &CountdownConfig {
        &self.config
    }

    /// Snapshot of lifetime counters.
    pub fn metrics(&self) -> &CountdownMetrics {
        &self.metrics
    }
}
