use anyhow::{Context, Result};
use std::process::Command;

use crate::config::LockAction;

/// Lockers tried in order until one succeeds
const LOCK_COMMANDS: &[(&str, &[&str])] = &[
    ("loginctl", &["lock-session"]),
    ("xdg-screensaver", &["lock"]),
    ("gnome-screensaver-command", &["--lock"]),
    ("cinnamon-screensaver-command", &["--lock"]),
    ("mate-screensaver-command", &["--lock"]),
    ("xscreensaver-command", &["-lock"]),
    ("light-locker-command", &["--lock"]),
];

const LOGOUT_COMMANDS: &[(&str, &[&str])] = &[
    ("loginctl", &["terminate-session", "self"]),
    ("gnome-session-quit", &["--logout", "--no-prompt"]),
    ("qdbus", &["org.kde.ksmserver", "/KSMServer", "logout", "0", "0", "0"]),
    ("xfce4-session-logout", &["--logout"]),
];

const SHUTDOWN_COMMANDS: &[(&str, &[&str])] = &[
    ("systemctl", &["poweroff"]),
    ("shutdown", &["-h", "now"]),
    ("poweroff", &[]),
];

fn candidates_for(action: LockAction) -> (&'static [(&'static str, &'static [&'static str])], &'static str) {
    match action {
        LockAction::Lock => (LOCK_COMMANDS, "screen lock"),
        LockAction::Logout => (LOGOUT_COMMANDS, "logout"),
        LockAction::Shutdown => (SHUTDOWN_COMMANDS, "shutdown"),
    }
}

pub fn lock_computer(action: LockAction) -> Result<()> {
    let (candidates, what) = candidates_for(action);

    first_successful(candidates)
        .with_context(|| format!("No supported {} mechanism found on this system", what))
}

/// True if at least one tool for `action` is installed
pub fn supports_action(action: LockAction) -> bool {
    let (candidates, _) = candidates_for(action);
    any_installed(candidates)
}

fn any_installed(candidates: &[(&str, &[&str])]) -> bool {
    candidates.iter().any(|(cmd, _)| which::which(cmd).is_ok())
}

pub fn send_notification(title: &str, message: &str) -> Result<()> {
    try_command(
        "notify-send",
        &[title, message, "--urgency=critical", "--icon=dialog-warning"],
    )
}

fn first_successful(candidates: &[(&str, &[&str])]) -> Result<()> {
    for (cmd, args) in candidates {
        match try_command(cmd, args) {
            Ok(()) => {
                tracing::debug!("{} succeeded", cmd);
                return Ok(());
            }
            Err(e) => tracing::debug!("{}", e),
        }
    }

    anyhow::bail!("all {} candidates failed", candidates.len())
}

/// Run a command, returning Ok if it exits successfully
fn try_command(cmd: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to run {}", cmd))?;

    if output.status.success() {
        Ok(())
    } else {
        anyhow::bail!("Command failed: {} {:?}", cmd, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tools_are_not_supported() {
        let candidates: &[(&str, &[&str])] = &[
            ("nonexistent_logout_a", &[]),
            ("nonexistent_logout_b", &["--now"]),
        ];
        assert!(!any_installed(candidates));
    }

    #[test]
    fn test_installed_tool_is_supported() {
        // `sh` is present on every Linux system the tests run on
        let candidates: &[(&str, &[&str])] = &[("nonexistent_locker", &[]), ("sh", &[])];
        assert!(any_installed(candidates));
    }

    #[test]
    fn test_try_command_with_invalid_command() {
        assert!(try_command("nonexistent_command_xyz", &[]).is_err());
    }

    #[test]
    fn test_first_successful_reports_when_nothing_works() {
        let candidates: &[(&str, &[&str])] = &[
            ("nonexistent_locker_a", &[]),
            ("nonexistent_locker_b", &["--lock"]),
        ];
        assert!(first_successful(candidates).is_err());
    }
}
