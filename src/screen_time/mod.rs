/// Screen time enforcement for a shared device
///
/// This module provides functionality to:
/// - Store profiles with daily, session and rest limits
/// - Track viewing time per profile per day
/// - Warn, count down and lock when a limit is crossed
/// - Switch between restricted and unrestricted profiles

pub mod auth;
pub mod clock;
pub mod core;
pub mod engine;
pub mod enforcement;
pub mod error;
pub mod events;
pub mod platform;
pub mod profile;
pub mod state;
pub mod store;
pub mod summary;
pub mod timer;

#[cfg(test)]
pub mod testing;

pub use auth::{CredentialAuth, RateLimiter};
pub use clock::SystemClock;
pub use core::EngineCore;
pub use engine::EnforcementEngine;
pub use enforcement::{run_command_executor, CommandExecutor, PlatformDevice};
pub use events::EngineEvent;
pub use profile::{MinuteLimit, Profile};
pub use store::{JsonStore, ProfileStore, SessionStore};
pub use summary::summarize_profiles;
