//! Reconnect decision engine
//!
//! [`ReconnectContext::decide`] turns a failure and the current streak length
//! into either a retry (RESUME or full RECONNECT, after a backoff) or a final
//! [`GiveUp`]. The only mutable state is the streak counter, owned by the
//! session loop.

use super::config::ReconnectConfig;
use super::failure::{FailureClassification, SessionFailure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// How the next connection re-establishes the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextState {
    /// Replay missed events with the stored session id and sequence
    Resume,
    /// Drop the session and IDENTIFY again
    Reconnect,
}

impl fmt::Display for NextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => write!(f, "RESUME"),
            Self::Reconnect => write!(f, "RECONNECT"),
        }
    }
}

/// A scheduled retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectAttempt {
    /// Position in the current failure streak, starting at 0
    pub iteration: u32,
    pub failure: FailureClassification,
    /// Raw failure the classification came from
    pub cause: SessionFailure,
    pub next_state: NextState,
    pub backoff: Duration,
}

/// Terminal decision: stop reconnecting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GiveUp {
    #[error("fatal close code {code}: {cause}")]
    Fatal { code: u16, cause: SessionFailure },

    #[error("gave up after {attempts} attempts: {cause}")]
    RetryExhausted { attempts: u32, cause: SessionFailure },

    #[error("partial disconnect: {cause}")]
    PartialDisconnect { cause: SessionFailure },
}

impl GiveUp {
    /// The failure that ended the session
    #[must_use]
    pub fn cause(&self) -> &SessionFailure {
        match self {
            Self::Fatal { cause, .. }
            | Self::RetryExhausted { cause, .. }
            | Self::PartialDisconnect { cause } => cause,
        }
    }
}

/// Result of [`ReconnectContext::decide`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Retry(ReconnectAttempt),
    GiveUp(GiveUp),
}

/// Callback invoked with every retry decision before its backoff starts
pub type AttemptObserver = Box<dyn Fn(&ReconnectAttempt) + Send + Sync>;

/// Per-session reconnect state
pub struct ReconnectContext {
    config: ReconnectConfig,
    iteration: u32,
    rng: StdRng,
    observer: Option<AttemptObserver>,
}

impl ReconnectContext {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Use a caller-provided random source for jitter
    #[must_use]
    pub fn with_rng(config: ReconnectConfig, rng: StdRng) -> Self {
        Self {
            config,
            iteration: 0,
            rng,
            observer: None,
        }
    }

    /// Register the pre-retry observer, replacing any previous one
    #[must_use]
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ReconnectAttempt) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    #[must_use]
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Failures in the current streak
    #[must_use]
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Decide how to recover from `failure`
    pub fn decide(&mut self, failure: SessionFailure) -> Outcome {
        let classification = failure.classify();

        let next_state = match classification {
            FailureClassification::Fatal(code) => {
                warn!(code, cause = %failure, "Fatal close, not retrying");
                return Outcome::GiveUp(GiveUp::Fatal {
                    code,
                    cause: failure,
                });
            }
            FailureClassification::PartialFailure => {
                warn!(cause = %failure, "Sibling shard failed, not retrying");
                return Outcome::GiveUp(GiveUp::PartialDisconnect { cause: failure });
            }
            FailureClassification::ResumableClose(_) => NextState::Resume,
            FailureClassification::NonResumableClose(_) => NextState::Reconnect,
        };

        if self.iteration >= self.config.max_retries {
            warn!(attempts = self.iteration, cause = %failure, "Retry budget exhausted");
            return Outcome::GiveUp(GiveUp::RetryExhausted {
                attempts: self.iteration,
                cause: failure,
            });
        }

        let base = self.base_backoff(next_state);
        let backoff = self.jitter(base);

        let attempt = ReconnectAttempt {
            iteration: self.iteration,
            failure: classification,
            cause: failure,
            next_state,
            backoff,
        };
        self.iteration = self.iteration.saturating_add(1);

        info!(
            iteration = attempt.iteration,
            next = %attempt.next_state,
            code = attempt.failure.code(),
            backoff_ms = attempt.backoff.as_millis() as u64,
            "Scheduling reconnect"
        );

        if let Some(observer) = &self.observer {
            observer(&attempt);
        }

        Outcome::Retry(attempt)
    }

    /// A READY or RESUMED confirmed the connection; returns the length of the
    /// streak that just ended
    pub fn reset(&mut self) -> u32 {
        std::mem::take(&mut self.iteration)
    }

    /// Undo the increment of an attempt whose backoff was cancelled
    pub fn revert(&mut self, attempt: &ReconnectAttempt) {
        if self.iteration == attempt.iteration.saturating_add(1) {
            self.iteration = attempt.iteration;
        }
    }

    fn base_backoff(&self, next_state: NextState) -> Duration {
        match (next_state, self.iteration) {
            // The first resume of a streak is immediate
            (NextState::Resume, 0) => Duration::ZERO,
            (NextState::Resume, n) => self.config.exponential(n - 1),
            (NextState::Reconnect, n) => self.config.exponential(n),
        }
    }

    fn jitter(&mut self, base: Duration) -> Duration {
        if base.is_zero() || self.config.jitter_factor <= 0.0 {
            return base;
        }

        let spread = base.mul_f64(self.config.jitter_factor);
        let low = base.saturating_sub(spread).max(self.config.min_backoff);
        let high = base.saturating_add(spread).min(self.config.max_backoff);

        if low >= high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}

impl fmt::Debug for ReconnectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectContext")
            .field("config", &self.config)
            .field("iteration", &self.iteration)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn closed(code: u16) -> SessionFailure {
        SessionFailure::Closed {
            code,
            reason: "test".to_string(),
        }
    }

    fn seeded(config: ReconnectConfig) -> ReconnectContext {
        ReconnectContext::with_rng(config, StdRng::seed_from_u64(7))
    }

    fn retry(outcome: Outcome) -> ReconnectAttempt {
        match outcome {
            Outcome::Retry(attempt) => attempt,
            Outcome::GiveUp(give_up) => panic!("unexpected give up: {give_up}"),
        }
    }

    #[test]
    fn test_first_resume_is_immediate() {
        for code in [1000, 1006, 4000, 4006, 4008] {
            let mut ctx = seeded(ReconnectConfig::default());
            let attempt = retry(ctx.decide(closed(code)));

            assert_eq!(attempt.next_state, NextState::Resume);
            assert_eq!(attempt.backoff, Duration::ZERO);
            assert_eq!(attempt.iteration, 0);
        }
    }

    #[test]
    fn test_resume_streak_scenario() {
        let config = ReconnectConfig::default().with_max_retries(2);
        let mut ctx = seeded(config);

        let first = retry(ctx.decide(closed(4006)));
        assert_eq!(first.next_state, NextState::Resume);
        assert_eq!(first.backoff, Duration::ZERO);

        let second = retry(ctx.decide(closed(4006)));
        assert_eq!(second.next_state, NextState::Resume);
        assert!(second.backoff >= config.min_backoff);
        assert!(second.backoff <= config.min_backoff.mul_f64(1.0 + config.jitter_factor));

        match ctx.decide(closed(4006)) {
            Outcome::GiveUp(GiveUp::RetryExhausted { attempts, cause }) => {
                assert_eq!(attempts, 2);
                assert_eq!(cause, closed(4006));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_reconnect_backoff_monotonic_then_capped() {
        let config = ReconnectConfig::default().with_jitter_factor(0.0);
        let mut ctx = seeded(config);

        let mut previous = Duration::ZERO;
        let mut reached_cap = false;
        for _ in 0..20 {
            let attempt = retry(ctx.decide(closed(4007)));
            assert_eq!(attempt.next_state, NextState::Reconnect);

            if reached_cap {
                assert_eq!(attempt.backoff, config.max_backoff);
            } else {
                assert!(attempt.backoff > previous);
                reached_cap = attempt.backoff == config.max_backoff;
            }
            previous = attempt.backoff;
        }
        assert!(reached_cap);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let config = ReconnectConfig::default();
        let mut ctx = ReconnectContext::new(config);

        for _ in 0..200 {
            let before = ctx.iteration();
            let attempt = retry(ctx.decide(closed(4009)));
            let base = config.exponential(before);
            let spread = base.mul_f64(config.jitter_factor);

            assert!(attempt.backoff >= config.min_backoff);
            assert!(attempt.backoff <= config.max_backoff);
            assert!(attempt.backoff >= base.saturating_sub(spread));
            assert!(attempt.backoff <= base + spread);
        }
    }

    #[test]
    fn test_fatal_codes_never_retry() {
        for code in [4004, 4010, 4011, 4012, 4013, 4014] {
            let mut ctx = seeded(ReconnectConfig::default());
            match ctx.decide(closed(code)) {
                Outcome::GiveUp(GiveUp::Fatal { code: got, .. }) => assert_eq!(got, code),
                other => panic!("code {code}: expected fatal, got {other:?}"),
            }
            assert_eq!(ctx.iteration(), 0);
        }
    }

    #[test]
    fn test_partial_failure_propagates_immediately() {
        let mut ctx = seeded(ReconnectConfig::default().with_max_retries(0));
        assert!(matches!(
            ctx.decide(SessionFailure::PartialDisconnect),
            Outcome::GiveUp(GiveUp::PartialDisconnect { .. })
        ));
    }

    #[test]
    fn test_reset_and_revert() {
        let mut ctx = seeded(ReconnectConfig::default());
        retry(ctx.decide(closed(4000)));
        let attempt = retry(ctx.decide(closed(4000)));
        assert_eq!(ctx.iteration(), 2);

        ctx.revert(&attempt);
        assert_eq!(ctx.iteration(), 1);
        // Reverting twice is a no-op
        ctx.revert(&attempt);
        assert_eq!(ctx.iteration(), 1);

        assert_eq!(ctx.reset(), 1);
        assert_eq!(ctx.iteration(), 0);
    }

    #[test]
    fn test_observer_sees_every_retry() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut ctx = seeded(ReconnectConfig::default())
            .on_retry(move |attempt| sink.lock().unwrap().push(attempt.iteration));

        retry(ctx.decide(closed(4000)));
        retry(ctx.decide(SessionFailure::InvalidSession { resumable: false }));
        let _ = ctx.decide(closed(4004));

        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }
}
