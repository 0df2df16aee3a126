//! Deadline-bounded pacing for operations that race an asynchronous remote process.
//!
//! A [`Ticker`] hands out attempt slots every `interval` until `max_wait` has
//! elapsed since it was started. Between slots it sleeps in `tick` sized slices so
//! the deadline and cancellation are noticed promptly. All timing goes through
//! `tokio::time`, so a paused test clock drives it deterministically.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

/// Default overall deadline.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// Default spacing between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Default deadline check granularity.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Deadline, attempt cadence and check granularity for a wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Stop no later than this long after the loop starts
    pub max_wait: Duration,

    /// Spacing between attempts
    pub interval: Duration,

    /// Longest single sleep between deadline checks
    pub tick: Duration,
}

impl WaitPolicy {
    /// Create a policy from explicit durations.
    #[must_use]
    pub const fn new(max_wait: Duration, interval: Duration, tick: Duration) -> Self {
        Self {
            max_wait,
            interval,
            tick,
        }
    }

    /// Set the overall deadline.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the attempt interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the check granularity.
    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Upper bound on the number of attempts a loop with this policy can make.
    #[must_use]
    pub fn max_attempts(&self) -> u64 {
        let interval = self.interval.as_millis().max(1);
        let attempts = self.max_wait.as_millis().div_ceil(interval);
        u64::try_from(attempts).unwrap_or(u64::MAX)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WAIT, DEFAULT_INTERVAL, DEFAULT_TICK)
    }
}

/// Outcome of waiting for the next attempt slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// An attempt is due now
    Attempt(u32),
    /// The deadline passed
    Expired,
    /// The caller cancelled the wait
    Cancelled,
}

/// Hands out attempt slots until the policy deadline.
#[derive(Debug)]
pub struct Ticker {
    policy: WaitPolicy,
    deadline: Instant,
    next_attempt: Instant,
    attempts: u32,
}

impl Ticker {
    /// Start the clock. The first attempt is due immediately.
    #[must_use]
    pub fn start(policy: WaitPolicy) -> Self {
        let now = Instant::now();
        Self {
            policy,
            deadline: now + policy.max_wait,
            next_attempt: now,
            attempts: 0,
        }
    }

    /// Number of attempt slots handed out so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Time elapsed since the ticker started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.policy
            .max_wait
            .saturating_sub(self.deadline.saturating_duration_since(Instant::now()))
    }

    /// Wait for the next attempt slot, the deadline, or cancellation.
    pub async fn next(&mut self, cancel: &mut CancelSignal) -> Tick {
        loop {
            if cancel.is_cancelled() {
                return Tick::Cancelled;
            }

            let now = Instant::now();
            if now >= self.deadline {
                return Tick::Expired;
            }

            if now >= self.next_attempt {
                self.next_attempt = now + self.policy.interval;
                self.attempts += 1;
                return Tick::Attempt(self.attempts);
            }

            let until_due = self.next_attempt.min(self.deadline) - now;
            let slice = until_due.min(self.policy.tick);

            tokio::select! {
                () = sleep(slice) => {}
                () = cancel.cancelled() => return Tick::Cancelled,
            }
        }
    }
}

/// Receiving side of a cancellation request.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that is never raised.
    #[must_use]
    pub const fn never() -> Self {
        Self { rx: None }
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.wait_for(|raised| *raised).await.is_ok() {
                return;
            }
            // Handle dropped without cancelling.
            self.rx = None;
        }
        std::future::pending::<()>().await;
    }
}

/// Sending side of a cancellation request.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a handle and the signal it controls.
    #[must_use]
    pub fn pair() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelSignal { rx: Some(rx) })
    }

    /// Request cancellation of every loop holding the paired signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal tied to this handle.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}
