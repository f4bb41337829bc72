use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::screen_time::clock::Clock;
use crate::screen_time::error::EngineError;
use crate::screen_time::events::{EngineCommand, EngineEvent, WarningReason};
use crate::screen_time::profile::{Profile, ProfileId, DEFAULT_RESTRICTED_PROFILE};
use crate::screen_time::state::{limit_reached, rest_unmet, EngineState, OverlayState, Phase};
use crate::screen_time::store::{ProfileStore, SessionSnapshot, SessionStore, UsageLedger};

/// Engine tuning knobs, filled from the `[engine]` config section
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Seconds between entering `Warning` and `LockDevice`
    pub countdown_secs: u32,
    /// Profile activated on startup and whenever the display goes off
    pub default_profile: String,
    /// Display state assumed before the first display event arrives
    pub initial_display_on: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 10,
            default_profile: DEFAULT_RESTRICTED_PROFILE.to_string(),
            initial_display_on: true,
        }
    }
}

/// Output of one decision step, in the order the decisions were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Command(EngineCommand),
    ArmTick,
    CancelTick,
    ArmCountdown,
    CancelCountdown,
}

/// The enforcement state machine.
///
/// Every input (an event, a tick, a countdown step) is processed to
/// completion and leaves its effects queued for [`EngineCore::drain_effects`].
/// The core never sleeps or spawns anything, so the async runner decides when
/// timers fire and tests drive it by hand.
pub struct EngineCore {
    profiles: Arc<dyn ProfileStore>,
    ledger: Arc<dyn UsageLedger>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    state: EngineState,
    effects: Vec<Effect>,
}

impl EngineCore {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        ledger: Arc<dyn UsageLedger>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let state = EngineState::new(clock.today(), settings.initial_display_on);
        Self {
            profiles,
            ledger,
            sessions,
            clock,
            settings,
            state,
            effects: Vec::new(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Rebuild state from the stores and activate the default profile
    pub fn initialize(&mut self) {
        match self.sessions.load_session_state() {
            Ok(saved) => self.state.last_session_end = saved.last_session_end,
            Err(e) => warn!("Failed to load session state, assuming rest satisfied: {}", e),
        }

        match self.resolve_default_profile() {
            Some(profile) => {
                self.activate(profile);
                if self.state.is_viewing() {
                    self.resume();
                } else {
                    self.settle_paused();
                }
            }
            None => warn!("No profile available to activate, engine stays Idle"),
        }
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        debug!("Handling event {:?} in {}", event, self.state.phase);

        match event {
            EngineEvent::DisplayOff => self.on_display_off(),
            EngineEvent::DisplayOn => {
                self.state.is_display_on = true;
                self.resume();
            }
            EngineEvent::AppForeground => {
                self.state.is_foreground = true;
                self.suspend();
            }
            EngineEvent::AppBackground => {
                self.state.is_foreground = false;
                self.resume();
            }
            EngineEvent::ProfileSwitchRequested { profile_id } => self.on_switch(profile_id),
            EngineEvent::ProfileConfigChanged { profile_id } => self.on_config_changed(profile_id),
            EngineEvent::ForegroundAppChanged { app_id } => self.on_foreground_app(app_id),
        }
    }

    /// One minute of viewing: accrue, persist, report, then check limits
    pub fn on_tick(&mut self) {
        if !self.state.is_ticking() {
            debug!("Dropping tick in {}", self.state.phase);
            return;
        }
        let Some(profile) = self.state.active_profile.clone() else {
            return;
        };

        let today = self.clock.today();
        if today != self.state.usage_date {
            info!(
                "Day rolled over from {} to {}, reloading usage for {}",
                self.state.usage_date, today, profile.name
            );
            self.reset_daily_usage(profile.id, today);
        } else if !self.state.usage_synced {
            self.sync_daily_usage(profile.id);
        }

        self.state.daily_usage = self.state.daily_usage.saturating_add(1);
        self.state.session_usage = self.state.session_usage.saturating_add(1);

        // In-memory counters stay authoritative; the next tick rewrites the total
        if self.state.usage_synced {
            if let Err(source) = self.ledger.set_usage(profile.id, today, self.state.daily_usage) {
                let err = EngineError::PersistenceWriteFailed {
                    profile_id: profile.id,
                    date: today,
                    source,
                };
                warn!("{}", err);
            }
        } else {
            warn!(
                "Usage for {} on {} not yet read, holding {}m in memory",
                profile.name, today, self.state.daily_usage
            );
        }

        debug!(
            "Tick for {}: daily={} session={}",
            profile.name, self.state.daily_usage, self.state.session_usage
        );
        self.push_command(EngineCommand::UsageChanged {
            profile_name: profile.name.clone(),
            daily_usage: self.state.daily_usage,
            session_usage: self.state.session_usage,
            session_limit: profile.session_limit,
        });

        if self.state.phase == Phase::Tracking {
            if let Some(reason) =
                limit_reached(&profile, self.state.daily_usage, self.state.session_usage)
            {
                self.enter_warning(reason);
            }
        }
    }

    /// One second of the countdown-to-lock
    pub fn on_countdown_step(&mut self) {
        if self.state.phase != Phase::Warning {
            return;
        }
        let Some(remaining) = self.state.countdown_remaining else {
            return;
        };

        let remaining = remaining.saturating_sub(1);
        self.push_command(EngineCommand::OverlayTick {
            seconds_remaining: remaining,
        });

        if remaining == 0 {
            info!("Countdown complete, locking device");
            self.push_command(EngineCommand::LockDevice);
            // Stay armed: if the lock does not take, lock again next round
            self.state.countdown_remaining = Some(self.settings.countdown_secs);
        } else {
            self.state.countdown_remaining = Some(remaining);
        }
    }

    /// Flush counters and stop timers before the process exits
    pub fn shutdown(&mut self) {
        if let Some(profile) = self.state.active_profile.as_ref() {
            if self.state.usage_synced {
                let flushed =
                    self.ledger
                        .set_usage(profile.id, self.state.usage_date, self.state.daily_usage);
                if let Err(e) = flushed {
                    warn!("Failed to flush usage on shutdown: {}", e);
                }
            }
        }

        let now = self.clock.now();
        self.save_session_snapshot(now);

        if self.state.is_ticking() {
            self.effects.push(Effect::CancelTick);
        }
        self.clear_warning();
        self.settle_paused();
        info!("Enforcement engine stopped");
    }

    fn on_display_off(&mut self) {
        if !self.state.is_display_on {
            debug!("Display already off");
            return;
        }
        self.state.is_display_on = false;
        self.suspend();

        let now = self.clock.now();
        self.save_session_snapshot(now);
        self.state.last_session_end = Some(now);
        if let Err(e) = self.sessions.set_last_session_end(now) {
            warn!("Failed to persist session end: {}", e);
        }

        if let Some(profile) = self.resolve_default_profile() {
            self.activate(profile);
        }
        self.settle_paused();
    }

    fn on_switch(&mut self, profile_id: ProfileId) {
        let Some(profile) = self.lookup_profile(profile_id) else {
            return;
        };

        info!("Switching to profile {} ({})", profile.name, profile.id);
        let now = self.clock.now();
        self.save_session_snapshot(now);
        self.activate(profile);

        if !self.state.is_viewing() {
            self.settle_paused();
        } else if self.state.is_ticking() {
            self.reevaluate();
        } else {
            self.resume();
        }
    }

    fn on_config_changed(&mut self, profile_id: ProfileId) {
        let Some(profile) = self.lookup_profile(profile_id) else {
            return;
        };

        match self.state.active_profile.as_ref() {
            Some(active) if active.id == profile_id => {
                if *active == profile {
                    debug!("Profile {} unchanged", profile.name);
                    return;
                }
            }
            _ => {
                debug!("Ignoring config change for inactive profile {}", profile_id);
                return;
            }
        }

        info!("Reloaded configuration for active profile {}", profile.name);
        self.state.active_profile = Some(profile);
        if self.state.is_ticking() {
            self.reevaluate();
        }
    }

    fn on_foreground_app(&mut self, app_id: String) {
        let Some(profile) = self.state.active_profile.as_ref() else {
            return;
        };

        if profile.blocks_app(&app_id) {
            info!("Blocking {} for profile {}", app_id, profile.name);
            let profile_name = profile.name.clone();
            self.push_command(EngineCommand::BlockApp { app_id, profile_name });
        }
    }

    fn lookup_profile(&self, profile_id: ProfileId) -> Option<Profile> {
        match self.profiles.get(profile_id) {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                warn!("{}, dropping event", EngineError::ProfileNotFound(profile_id));
                None
            }
            Err(e) => {
                warn!("Failed to load profile {}: {}", profile_id, e);
                None
            }
        }
    }

    fn resolve_default_profile(&self) -> Option<Profile> {
        match self.profiles.get_by_name(&self.settings.default_profile) {
            Ok(Some(profile)) => return Some(profile),
            Ok(None) => warn!(
                "Default profile '{}' not found, falling back to first restricted profile",
                self.settings.default_profile
            ),
            Err(e) => warn!("Failed to load default profile: {}", e),
        }

        match self.profiles.list() {
            Ok(profiles) => profiles.into_iter().find(|p| p.is_restricted),
            Err(e) => {
                warn!("Failed to list profiles: {}", e);
                None
            }
        }
    }

    /// Make `profile` active with today's usage and a fresh session
    fn activate(&mut self, profile: Profile) {
        self.reset_daily_usage(profile.id, self.clock.today());
        self.state.session_usage = 0;

        if let Err(e) = self.sessions.set_last_active_profile(&profile.name) {
            warn!("Failed to persist last active profile: {}", e);
        }

        info!(
            "Active profile: {} (daily usage {}m, daily limit {}, session limit {})",
            profile.name, self.state.daily_usage, profile.daily_limit, profile.session_limit
        );
        self.state.active_profile = Some(profile);
    }

    fn reset_daily_usage(&mut self, profile_id: ProfileId, date: chrono::NaiveDate) {
        self.state.daily_usage = 0;
        self.state.usage_date = date;
        self.state.usage_synced = false;
        self.sync_daily_usage(profile_id);
    }

    /// Add the ledger total for `usage_date` to the minutes counted while it
    /// was unreadable. On failure the counter stays unsynced.
    fn sync_daily_usage(&mut self, profile_id: ProfileId) {
        let date = self.state.usage_date;
        match self.ledger.get_usage(profile_id, date) {
            Ok(stored) => {
                self.state.daily_usage = stored.unwrap_or(0).saturating_add(self.state.daily_usage);
                self.state.usage_synced = true;
            }
            Err(e) => warn!("Failed to read usage for profile {} on {}: {}", profile_id, date, e),
        }
    }

    /// Record the session that just ended. A profile activated without any
    /// viewing since keeps its previous snapshot.
    fn save_session_snapshot(&self, now: chrono::DateTime<chrono::Local>) {
        let Some(profile) = self.state.active_profile.as_ref() else {
            return;
        };
        if self.state.session_usage == 0 {
            debug!("No session usage for {}, keeping last snapshot", profile.name);
            return;
        }

        let snapshot = SessionSnapshot {
            session_minutes: self.state.session_usage,
            ended_at: now,
        };
        if let Err(e) = self.sessions.save_snapshot(profile.id, snapshot) {
            warn!("Failed to save session snapshot for {}: {}", profile.name, e);
        }
    }

    /// Leave `Tracking`/`Warning`: stop both timers and hide the overlay
    fn suspend(&mut self) {
        if self.state.is_ticking() {
            self.effects.push(Effect::CancelTick);
        }
        self.clear_warning();
        self.settle_paused();
    }

    /// Start viewing again if the display is on and the app is backgrounded.
    /// The rest period and limits are checked before any tracking starts.
    fn resume(&mut self) {
        if !self.state.is_viewing() {
            return;
        }
        if self.state.active_profile.is_none() {
            self.set_phase(Phase::Idle);
            return;
        }
        if self.state.is_ticking() {
            return;
        }

        self.state.rest_gate = true;
        self.effects.push(Effect::ArmTick);
        self.reevaluate();
    }

    fn reevaluate(&mut self) {
        let Some(profile) = self.state.active_profile.as_ref() else {
            return;
        };

        let now = self.clock.now();
        let violation = limit_reached(profile, self.state.daily_usage, self.state.session_usage)
            .or_else(|| {
                (self.state.rest_gate && rest_unmet(profile, self.state.last_session_end, now))
                    .then_some(WarningReason::RestRequired)
            });

        match violation {
            Some(reason) => self.enter_warning(reason),
            None => self.enter_tracking(),
        }
    }

    fn enter_tracking(&mut self) {
        self.clear_warning();
        self.state.rest_gate = false;
        self.set_phase(Phase::Tracking);
    }

    fn enter_warning(&mut self, reason: WarningReason) {
        if self.state.phase == Phase::Warning {
            if self.state.warning_reason != Some(reason) {
                info!("Warning reason is now {:?}", reason);
                self.state.warning_reason = Some(reason);
            }
            return;
        }

        let profile_name = self
            .state
            .active_profile_name()
            .unwrap_or_default()
            .to_string();
        info!("{} for {}", reason.title(), profile_name);

        self.state.warning_reason = Some(reason);
        self.state.overlay = OverlayState::Showing;
        self.push_command(EngineCommand::ShowOverlay { reason, profile_name });

        let countdown = self.settings.countdown_secs;
        self.state.countdown_remaining = Some(countdown);
        self.push_command(EngineCommand::OverlayTick {
            seconds_remaining: countdown,
        });
        self.effects.push(Effect::ArmCountdown);

        self.set_phase(Phase::Warning);
    }

    /// Cancel the countdown and hide the overlay. Safe to call repeatedly.
    fn clear_warning(&mut self) {
        if self.state.countdown_remaining.take().is_some() {
            self.effects.push(Effect::CancelCountdown);
        }
        if self.state.overlay == OverlayState::Showing {
            self.state.overlay = OverlayState::Hidden;
            self.push_command(EngineCommand::HideOverlay);
        }
        self.state.warning_reason = None;
    }

    fn settle_paused(&mut self) {
        let phase = if self.state.active_profile.is_some() {
            Phase::Suspended
        } else {
            Phase::Idle
        };
        self.set_phase(phase);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.state.phase != phase {
            info!("{} -> {}", self.state.phase, phase);
            self.state.phase = phase;
        }
    }

    fn push_command(&mut self, command: EngineCommand) {
        self.effects.push(Effect::Command(command));
    }
}
