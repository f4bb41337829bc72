use chrono::{DateTime, Local, NaiveDate};
use std::fmt;

use crate::screen_time::events::WarningReason;
use crate::screen_time::profile::Profile;

/// Engine state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No active profile
    Idle,
    /// Ticking and accumulating usage
    Tracking,
    /// Violation detected, overlay shown, countdown armed
    Warning,
    /// Display off or controlling app foregrounded
    Suspended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::Tracking => "Tracking",
            Phase::Warning => "Warning",
            Phase::Suspended => "Suspended",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Hidden,
    Showing,
}

/// In-memory state owned by the engine, rebuilt from the stores on startup
#[derive(Debug, Clone)]
pub struct EngineState {
    pub active_profile: Option<Profile>,

    /// Mirrors the ledger record for (active profile, `usage_date`)
    pub daily_usage: u32,
    pub usage_date: NaiveDate,

    /// False while the ledger total for `usage_date` could not be read.
    /// `daily_usage` then only holds minutes accrued since, and nothing is
    /// written back until a read succeeds.
    pub usage_synced: bool,

    /// Minutes since the active profile was last activated
    pub session_usage: u32,

    pub last_session_end: Option<DateTime<Local>>,
    pub overlay: OverlayState,
    pub phase: Phase,
    pub is_foreground: bool,
    pub is_display_on: bool,

    /// Set when viewing resumes, cleared once tracking starts. While set the
    /// rest period gates the transition to `Tracking`.
    pub rest_gate: bool,

    pub countdown_remaining: Option<u32>,
    pub warning_reason: Option<WarningReason>,
}

impl EngineState {
    pub fn new(today: NaiveDate, is_display_on: bool) -> Self {
        Self {
            active_profile: None,
            daily_usage: 0,
            usage_date: today,
            usage_synced: false,
            session_usage: 0,
            last_session_end: None,
            overlay: OverlayState::Hidden,
            phase: Phase::Idle,
            is_foreground: false,
            is_display_on,
            rest_gate: false,
            countdown_remaining: None,
            warning_reason: None,
        }
    }

    /// Display on and the controlling app in the background
    pub fn is_viewing(&self) -> bool {
        self.is_display_on && !self.is_foreground
    }

    /// The tick timer runs in exactly these phases
    pub fn is_ticking(&self) -> bool {
        matches!(self.phase, Phase::Tracking | Phase::Warning)
    }

    pub fn active_profile_name(&self) -> Option<&str> {
        self.active_profile.as_ref().map(|p| p.name.as_str())
    }
}

/// Which limit, if any, the usage counters violate. Daily wins over session.
/// Unrestricted profiles never reach a limit.
pub fn limit_reached(profile: &Profile, daily_usage: u32, session_usage: u32) -> Option<WarningReason> {
    if !profile.is_restricted {
        return None;
    }

    if profile.daily_limit.is_reached(daily_usage) {
        Some(WarningReason::DailyLimit)
    } else if profile.session_limit.is_reached(session_usage) {
        Some(WarningReason::SessionLimit)
    } else {
        None
    }
}

/// True if a restricted profile's rest period has not elapsed since `last_end`.
/// No recorded session end always satisfies rest.
pub fn rest_unmet(profile: &Profile, last_end: Option<DateTime<Local>>, now: DateTime<Local>) -> bool {
    if !profile.is_restricted || profile.rest_minutes == 0 {
        return false;
    }

    match last_end {
        Some(end) => now - end < chrono::Duration::minutes(i64::from(profile.rest_minutes)),
        None => false,
    }
}
