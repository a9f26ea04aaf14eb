//! Circuit breaker guarding connection attempts.
//!
//! After `failure_threshold` consecutive failures the breaker opens and
//! connection attempts fail fast without touching the socket. Once the
//! recovery timeout elapses it half-opens, permitting exactly one trial
//! attempt: success closes the breaker and zeroes the failure count,
//! failure re-opens it.

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, VoicegateError};
use std::time::{Duration, Instant};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation; attempts pass through.
    Closed,
    /// Failing fast; no attempts until the recovery timeout elapses.
    Open,
    /// One trial attempt in flight.
    HalfOpen,
}

/// Circuit breaker with an injectable clock.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    clock: C,
}

impl CircuitBreaker<SystemClock> {
    /// Creates a breaker using the system clock.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self::with_clock(failure_threshold, recovery_timeout, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Creates a breaker with the given clock.
    pub fn with_clock(failure_threshold: u32, recovery_timeout: Duration, clock: C) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            clock,
        }
    }

    /// Asks permission for a connection attempt.
    ///
    /// Returns `CircuitOpen` while the breaker is open and the recovery
    /// timeout has not elapsed, or while a half-open trial is already
    /// permitted. The transition to half-open itself grants the one trial.
    pub fn try_acquire(&mut self) -> Result<()> {
        match self.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| self.clock.now().duration_since(at))
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.recovery_timeout {
                    self.state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    let remaining = self.recovery_timeout - elapsed;
                    Err(VoicegateError::CircuitOpen {
                        retry_after_ms: remaining.as_millis() as u64,
                    })
                }
            }
            BreakerState::HalfOpen => Err(VoicegateError::CircuitOpen {
                retry_after_ms: 0,
            }),
        }
    }

    /// Records a successful connection: closes the breaker, zeroes failures.
    pub fn record_success(&mut self) {
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Records a failed connection attempt.
    ///
    /// Opens the breaker when the consecutive-failure threshold is reached,
    /// or immediately when a half-open trial fails.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.state == BreakerState::HalfOpen
            || self.consecutive_failures >= self.failure_threshold
        {
            self.state = BreakerState::Open;
            self.opened_at = Some(self.clock.now());
        }
    }

    /// Returns the current breaker state.
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Returns the consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
