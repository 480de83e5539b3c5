//! Reconnect configuration

use gateway_common::ReconnectSettings;
use std::time::Duration;

/// Backoff bounds and retry budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectConfig {
    /// Lower bound of every non-zero backoff (2 s)
    pub min_backoff: Duration,
    /// Upper bound of every backoff (120 s)
    pub max_backoff: Duration,
    /// Relative jitter, 0.0 to 1.0 (0.5)
    pub jitter_factor: f64,
    /// Failures tolerated in one streak before giving up
    pub max_retries: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
            jitter_factor: 0.5,
            max_retries: u32::MAX,
        }
    }
}

impl ReconnectConfig {
    #[must_use]
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max.max(min);
        self
    }

    #[must_use]
    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// `min(max_backoff, min_backoff * 2^n)`, saturating
    #[must_use]
    pub fn exponential(&self, n: u32) -> Duration {
        1u32.checked_shl(n)
            .and_then(|factor| self.min_backoff.checked_mul(factor))
            .map_or(self.max_backoff, |backoff| backoff.min(self.max_backoff))
    }
}

impl From<ReconnectSettings> for ReconnectConfig {
    fn from(settings: ReconnectSettings) -> Self {
        Self::default()
            .with_backoff(settings.min_backoff, settings.max_backoff)
            .with_jitter_factor(settings.jitter_factor)
            .with_max_retries(settings.max_retries)
    }
}
