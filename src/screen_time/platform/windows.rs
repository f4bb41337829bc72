use anyhow::{Context, Result};
use std::process::Command;

use crate::config::LockAction;

pub fn lock_computer(action: LockAction) -> Result<()> {
    let (cmd, args): (&str, &[&str]) = match action {
        LockAction::Lock => ("rundll32.exe", &["user32.dll,LockWorkStation"][..]),
        LockAction::Logout => ("shutdown", &["/l"][..]),
        LockAction::Shutdown => ("shutdown", &["/s", "/f", "/t", "0"][..]),
    };

    let status = Command::new(cmd)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {}", cmd))?;

    if !status.success() {
        anyhow::bail!("{} {:?} exited with {}", cmd, args, status);
    }

    Ok(())
}

pub fn supports_action(action: LockAction) -> bool {
    matches!(action, LockAction::Lock | LockAction::Logout | LockAction::Shutdown)
}

pub fn send_notification(title: &str, message: &str) -> Result<()> {
    // No toast support without a UI host; surface in the service log
    tracing::warn!("Notification: {} - {}", title, message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_all_actions() {
        assert!(supports_action(LockAction::Lock));
        assert!(supports_action(LockAction::Logout));
        assert!(supports_action(LockAction::Shutdown));
    }
}
