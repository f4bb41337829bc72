use anyhow::{Context, Result};
use std::process::Command;

use crate::config::LockAction;

pub fn lock_computer(action: LockAction) -> Result<()> {
    let script = match action {
        LockAction::Lock => {
            "tell application \"System Events\" to keystroke \"q\" using {command down, control down}"
        }
        LockAction::Logout => "tell application \"System Events\" to log out",
        LockAction::Shutdown => "tell application \"System Events\" to shut down",
    };

    run_osascript(script)
}

pub fn supports_action(action: LockAction) -> bool {
    matches!(action, LockAction::Lock | LockAction::Logout | LockAction::Shutdown)
}

pub fn send_notification(title: &str, message: &str) -> Result<()> {
    let script = format!(
        "display notification \"{}\" with title \"{}\" sound name \"Glass\"",
        escape(message),
        escape(title)
    );
    run_osascript(&script)
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn run_osascript(script: &str) -> Result<()> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .context("Failed to run osascript")?;

    if !output.status.success() {
        anyhow::bail!(
            "osascript failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}
