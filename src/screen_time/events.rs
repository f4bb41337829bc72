use serde::{Deserialize, Serialize};

use crate::screen_time::profile::{MinuteLimit, ProfileId};

/// Decoded lifecycle events consumed by the engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    DisplayOn,
    DisplayOff,
    AppForeground,
    AppBackground,
    /// Raised by the switch UI after the credential check passed
    ProfileSwitchRequested { profile_id: ProfileId },
    ProfileConfigChanged { profile_id: ProfileId },
    ForegroundAppChanged { app_id: String },
}

impl EngineEvent {
    /// Parse one newline-delimited JSON event
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

/// Why the warning overlay is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningReason {
    DailyLimit,
    SessionLimit,
    RestRequired,
}

impl WarningReason {
    pub fn title(&self) -> &'static str {
        match self {
            WarningReason::DailyLimit => "Daily Limit Reached",
            WarningReason::SessionLimit => "Session Limit Reached",
            WarningReason::RestRequired => "Rest Required",
        }
    }
}

/// Commands emitted by the engine for the overlay, lock and notification
/// collaborators to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineCommand {
    UsageChanged {
        profile_name: String,
        daily_usage: u32,
        session_usage: u32,
        session_limit: MinuteLimit,
    },
    ShowOverlay {
        reason: WarningReason,
        profile_name: String,
    },
    OverlayTick {
        seconds_remaining: u32,
    },
    HideOverlay,
    LockDevice,
    BlockApp {
        app_id: String,
        profile_name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_events() {
        assert_eq!(
            EngineEvent::from_json_line(r#"{"type":"display_off"}"#).unwrap(),
            EngineEvent::DisplayOff
        );
        assert_eq!(
            EngineEvent::from_json_line("  {\"type\":\"app_background\"}\n").unwrap(),
            EngineEvent::AppBackground
        );
    }

    #[test]
    fn test_parse_profile_events() {
        assert_eq!(
            EngineEvent::from_json_line(r#"{"type":"profile_switch_requested","profile_id":2}"#)
                .unwrap(),
            EngineEvent::ProfileSwitchRequested { profile_id: 2 }
        );
        assert_eq!(
            EngineEvent::from_json_line(r#"{"type":"foreground_app_changed","app_id":"tv.game"}"#)
                .unwrap(),
            EngineEvent::ForegroundAppChanged {
                app_id: "tv.game".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_event() {
        assert!(EngineEvent::from_json_line(r#"{"type":"reboot"}"#).is_err());
        assert!(EngineEvent::from_json_line(r#"{"type":"profile_switch_requested"}"#).is_err());
    }

    #[test]
    fn test_command_serializes_with_tag() {
        let json = serde_json::to_value(EngineCommand::UsageChanged {
            profile_name: "Child".to_string(),
            daily_usage: 12,
            session_usage: 3,
            session_limit: MinuteLimit::Unlimited,
        })
        .unwrap();

        assert_eq!(json["type"], "usage_changed");
        assert_eq!(json["session_limit"], -1);
    }
}
