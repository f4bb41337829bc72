use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::LockAction;
use crate::screen_time::error::EngineError;
use crate::screen_time::events::EngineCommand;
use crate::screen_time::platform;

/// Side effects the executor needs from the device
pub trait DeviceControl: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<()>;

    fn lock(&self, action: LockAction) -> Result<()>;

    fn supports(&self, action: LockAction) -> bool;
}

/// The host OS
pub struct PlatformDevice;

impl DeviceControl for PlatformDevice {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        platform::send_notification(title, message)
    }

    fn lock(&self, action: LockAction) -> Result<()> {
        platform::lock_computer(action)
    }

    fn supports(&self, action: LockAction) -> bool {
        platform::supports_action(action)
    }
}

/// Executes engine commands. Holds no decision state: overlay commands are
/// best-effort, and a lock is always attempted.
#[derive(Clone)]
pub struct CommandExecutor {
    action: LockAction,
    device: Arc<dyn DeviceControl>,
}

impl CommandExecutor {
    pub fn new(action: LockAction, device: Arc<dyn DeviceControl>) -> Self {
        Self { action, device }
    }

    pub fn execute(&self, command: &EngineCommand) -> Result<(), EngineError> {
        match command {
            EngineCommand::UsageChanged {
                profile_name,
                daily_usage,
                session_usage,
                session_limit,
            } => {
                info!(
                    "Usage for {}: {}m today, {}m this session (limit {})",
                    profile_name, daily_usage, session_usage, session_limit
                );
                Ok(())
            }
            EngineCommand::ShowOverlay { reason, profile_name } => self.render(
                reason.title(),
                &format!(
                    "{}, screen time is up. The device will lock shortly unless a parent switches profile.",
                    profile_name
                ),
            ),
            EngineCommand::OverlayTick { seconds_remaining } => {
                debug!("Locking in {}s", seconds_remaining);
                Ok(())
            }
            EngineCommand::HideOverlay => self.render("Screen Time", "Warning cleared"),
            EngineCommand::BlockApp { app_id, profile_name } => self.render(
                "App Blocked",
                &format!("{} is not allowed for {}", app_id, profile_name),
            ),
            EngineCommand::LockDevice => self.lock(),
        }
    }

    fn render(&self, title: &str, message: &str) -> Result<(), EngineError> {
        self.device
            .notify(title, message)
            .map_err(|e| EngineError::OverlayRenderFailed(format!("{:#}", e)))
    }

    fn lock(&self) -> Result<(), EngineError> {
        let action = if self.device.supports(self.action) {
            self.action
        } else {
            warn!("Platform does not support action {:?}, falling back to Lock", self.action);
            LockAction::Lock
        };

        self.device
            .lock(action)
            .map_err(|e| EngineError::LockFailed(format!("{:#}", e)))?;

        info!("Enforced {:?}", action);
        Ok(())
    }
}

/// Execute commands in the order the engine emitted them until the channel
/// closes. Failures are logged and skipped.
pub async fn run_command_executor(
    executor: CommandExecutor,
    mut commands: mpsc::UnboundedReceiver<EngineCommand>,
) {
    while let Some(command) = commands.recv().await {
        let executor = executor.clone();
        match tokio::task::spawn_blocking(move || executor.execute(&command)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{}", e),
            Err(e) => error!("Command execution task failed: {}", e),
        }
    }
    debug!("Command channel closed");
}
