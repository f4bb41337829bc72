//! Device lock and desktop notification backends

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

use anyhow::Result;

use crate::config::LockAction;

/// Lock (or log out / power off) the device
pub fn lock_computer(action: LockAction) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        windows::lock_computer(action)
    }

    #[cfg(target_os = "macos")]
    {
        macos::lock_computer(action)
    }

    #[cfg(target_os = "linux")]
    {
        linux::lock_computer(action)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        let _ = action;
        anyhow::bail!("Unsupported operating system for device locking")
    }
}

pub fn supports_action(action: LockAction) -> bool {
    #[cfg(target_os = "windows")]
    {
        windows::supports_action(action)
    }

    #[cfg(target_os = "macos")]
    {
        macos::supports_action(action)
    }

    #[cfg(target_os = "linux")]
    {
        linux::supports_action(action)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        let _ = action;
        false
    }
}

/// Show a desktop notification
pub fn send_notification(title: &str, message: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        windows::send_notification(title, message)
    }

    #[cfg(target_os = "macos")]
    {
        macos::send_notification(title, message)
    }

    #[cfg(target_os = "linux")]
    {
        linux::send_notification(title, message)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        tracing::warn!("Notification: {} - {}", title, message);
        Ok(())
    }
}
