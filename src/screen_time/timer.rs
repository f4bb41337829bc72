use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Tick,
    Countdown,
}

/// Message sent by a timer task each period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

/// Cancellable repeating timer feeding the engine's decision loop.
///
/// Cancelling aborts the task and bumps the generation, so a message already
/// queued by the old task is recognisably stale and never acted upon.
pub struct RepeatingTimer {
    kind: TimerKind,
    period: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
    fired: mpsc::UnboundedSender<TimerFired>,
}

impl RepeatingTimer {
    pub fn new(kind: TimerKind, period: Duration, fired: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            kind,
            period,
            generation: 0,
            handle: None,
            fired,
        }
    }

    /// (Re)start the timer; the first message arrives one period from now
    pub fn arm(&mut self) {
        self.cancel();

        let kind = self.kind;
        let period = self.period;
        let generation = self.generation;
        let fired = self.fired.clone();

        self.handle = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if fired.send(TimerFired { kind, generation }).is_err() {
                    break;
                }
            }
        }));
    }

    /// Idempotent
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation += 1;
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// True if `fired` came from the currently armed task
    pub fn is_current(&self, fired: &TimerFired) -> bool {
        self.is_armed() && fired.kind == self.kind && fired.generation == self.generation
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_every_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RepeatingTimer::new(TimerKind::Tick, Duration::from_secs(60), tx);
        let started = Instant::now();

        timer.arm();
        let first = rx.recv().await.unwrap();
        assert!(timer.is_current(&first));
        assert_eq!(started.elapsed(), Duration::from_secs(60));

        rx.recv().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_marks_queued_messages_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RepeatingTimer::new(TimerKind::Countdown, Duration::from_secs(1), tx);

        timer.arm();
        let queued = rx.recv().await.unwrap();
        timer.cancel();
        timer.cancel();

        assert!(!timer.is_armed());
        assert!(!timer.is_current(&queued));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_starts_new_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RepeatingTimer::new(TimerKind::Tick, Duration::from_secs(1), tx);

        timer.arm();
        let old = rx.recv().await.unwrap();
        timer.arm();
        let new = rx.recv().await.unwrap();

        assert!(!timer.is_current(&old));
        assert!(timer.is_current(&new));
        assert!(new.generation > old.generation);
    }
}
