use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::screen_time::core::{Effect, EngineCore};
use crate::screen_time::events::{EngineCommand, EngineEvent};
use crate::screen_time::timer::{RepeatingTimer, TimerFired, TimerKind};

/// Async shell around [`EngineCore`].
///
/// One loop owns the core and serializes external events with the tick and
/// countdown timers. Effects are applied before the next input is taken, so
/// a cancelled timer can never deliver a tick to a later decision.
pub struct EnforcementEngine {
    core: EngineCore,
    tick: RepeatingTimer,
    countdown: RepeatingTimer,
    fired: mpsc::UnboundedReceiver<TimerFired>,
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl EnforcementEngine {
    /// Returns the engine and the receiving end of its command stream
    pub fn new(
        core: EngineCore,
        tick_period: Duration,
        countdown_period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<EngineCommand>) {
        let (fired_tx, fired) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let engine = Self {
            core,
            tick: RepeatingTimer::new(TimerKind::Tick, tick_period, fired_tx.clone()),
            countdown: RepeatingTimer::new(TimerKind::Countdown, countdown_period, fired_tx),
            fired,
            commands,
        };

        (engine, commands_rx)
    }

    /// Run until the event channel closes, then flush and stop
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) -> EngineCore {
        info!("Enforcement engine started");
        self.core.initialize();
        self.apply_effects();

        loop {
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(event) => self.core.handle_event(event),
                    None => break,
                },
                Some(fired) = self.fired.recv() => self.on_timer(fired),
            }

            self.apply_effects();
        }

        debug!("Event channel closed");
        self.core.shutdown();
        self.apply_effects();
        self.core
    }

    fn on_timer(&mut self, fired: TimerFired) {
        match fired.kind {
            TimerKind::Tick if self.tick.is_current(&fired) => self.core.on_tick(),
            TimerKind::Countdown if self.countdown.is_current(&fired) => {
                self.core.on_countdown_step()
            }
            kind => debug!("Ignoring stale {:?} timer", kind),
        }
    }

    fn apply_effects(&mut self) {
        for effect in self.core.drain_effects() {
            match effect {
                Effect::Command(command) => {
                    if self.commands.send(command).is_err() {
                        debug!("Command receiver dropped");
                    }
                }
                Effect::ArmTick => self.tick.arm(),
                Effect::CancelTick => self.tick.cancel(),
                Effect::ArmCountdown => self.countdown.arm(),
                Effect::CancelCountdown => self.countdown.cancel(),
            }
        }
    }
}
