use chrono::NaiveDate;
use thiserror::Error;

use crate::screen_time::profile::ProfileId;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by the profile, usage and session stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported {table} table version {version}")]
    UnsupportedVersion { table: &'static str, version: String },

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Duplicate profile name: {0}")]
    DuplicateName(String),

    #[error("Failed to write {table}: {message}")]
    Write { table: &'static str, message: String },

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Engine-side failures. None of these are fatal: each one degrades to
/// "skip this effect, keep ticking".
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(ProfileId),

    #[error("Failed to persist usage for profile {profile_id} on {date}: {source}")]
    PersistenceWriteFailed {
        profile_id: ProfileId,
        date: NaiveDate,
        #[source]
        source: StoreError,
    },

    #[error("Overlay render failed: {0}")]
    OverlayRenderFailed(String),

    #[error("Device lock failed: {0}")]
    LockFailed(String),
}
