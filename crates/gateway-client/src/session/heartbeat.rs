//! Client heartbeat

use crate::reconnect::SessionFailure;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Heartbeat timer and ack bookkeeping for one connection
#[derive(Debug)]
pub(crate) struct Heartbeat {
    interval: Interval,
    period: Duration,
    /// Send time of the heartbeat still waiting for its ack
    pending: Option<Instant>,
}

impl Heartbeat {
    /// First beat fires one full period from now
    pub(crate) fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            period,
            pending: None,
        }
    }

    pub(crate) async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Record a scheduled beat
    ///
    /// Fails if the previous beat was never acknowledged: the connection is
    /// zombied and must be replaced.
    pub(crate) fn beat(&mut self) -> Result<(), SessionFailure> {
        if self.pending.is_some() {
            return Err(SessionFailure::HeartbeatTimeout);
        }
        self.pending = Some(Instant::now());
        Ok(())
    }

    /// Record an ack and return the round trip, if a beat was outstanding
    pub(crate) fn ack(&mut self) -> Option<Duration> {
        self.pending.take().map(|sent| sent.elapsed())
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(45));
        let start = Instant::now();

        heartbeat.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(45));

        heartbeat.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacked_beat_is_zombie() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(1));

        assert!(heartbeat.beat().is_ok());
        time::advance(Duration::from_millis(120)).await;
        assert_eq!(heartbeat.ack(), Some(Duration::from_millis(120)));

        assert!(heartbeat.beat().is_ok());
        assert_eq!(heartbeat.beat(), Err(SessionFailure::HeartbeatTimeout));
    }

    #[tokio::test]
    async fn test_stray_ack_ignored() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(1));
        assert_eq!(heartbeat.ack(), None);
        assert_eq!(heartbeat.period(), Duration::from_secs(1));
    }
}
