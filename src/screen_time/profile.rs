use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::screen_time::auth::CredentialAuth;
use crate::screen_time::error::{StoreError, StoreResult};

pub type ProfileId = i64;

/// Name of the seeded restricted profile the device falls back to
pub const DEFAULT_RESTRICTED_PROFILE: &str = "Child";

/// Name of the seeded unrestricted profile
pub const DEFAULT_PARENT_PROFILE: &str = "Parent";

/// A minute threshold. Persisted as an integer where `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum MinuteLimit {
    Unlimited,
    Minutes(u32),
}

impl MinuteLimit {
    /// True once `used` minutes meet or exceed the threshold
    pub fn is_reached(&self, used: u32) -> bool {
        match self {
            MinuteLimit::Unlimited => false,
            MinuteLimit::Minutes(limit) => used >= *limit,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, MinuteLimit::Unlimited)
    }
}

impl TryFrom<i64> for MinuteLimit {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(MinuteLimit::Unlimited),
            v if v < -1 => Err(format!("minute limit must be -1 or non-negative, got {}", v)),
            v => u32::try_from(v)
                .map(MinuteLimit::Minutes)
                .map_err(|_| format!("minute limit too large: {}", v)),
        }
    }
}

impl From<MinuteLimit> for i64 {
    fn from(limit: MinuteLimit) -> Self {
        match limit {
            MinuteLimit::Unlimited => -1,
            MinuteLimit::Minutes(m) => m as i64,
        }
    }
}

impl fmt::Display for MinuteLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinuteLimit::Unlimited => write!(f, "Unlimited"),
            MinuteLimit::Minutes(m) => write!(f, "{}m", m),
        }
    }
}

/// A named policy bundle selectable by the viewer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Unique identifier, assigned by the store (0 = not yet stored)
    #[serde(default)]
    pub id: ProfileId,

    /// Unique human label
    pub name: String,

    /// Restricted profiles are subject to limits, unrestricted are exempt
    pub is_restricted: bool,

    /// Argon2 hash of the profile PIN. Only restricted profiles may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    #[serde(rename = "daily_limit_minutes")]
    pub daily_limit: MinuteLimit,

    #[serde(rename = "session_limit_minutes")]
    pub session_limit: MinuteLimit,

    /// Mandatory rest between sessions (0 = none)
    #[serde(default)]
    pub rest_minutes: u32,

    /// App identifiers blocked while this profile is active (restricted only)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub blocked_apps: BTreeSet<String>,
}

impl Profile {
    /// Validate the write-time invariants of a profile
    pub fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::InvalidProfile("profile name cannot be empty".to_string()));
        }

        let has_credential = self.credential.as_deref().is_some_and(|c| !c.is_empty());
        if !self.is_restricted && !has_credential {
            return Err(StoreError::InvalidProfile(format!(
                "unrestricted profile '{}' must have a credential",
                self.name
            )));
        }

        Ok(())
    }

    /// Whether switching to this profile needs a credential check
    pub fn requires_credential(&self) -> bool {
        self.credential.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Whether `app_id` is blocked for this profile
    pub fn blocks_app(&self, app_id: &str) -> bool {
        self.is_restricted && self.blocked_apps.contains(app_id)
    }
}

/// The two profiles seeded on first run
pub fn default_profiles() -> anyhow::Result<Vec<Profile>> {
    Ok(vec![
        Profile {
            id: 0,
            name: DEFAULT_RESTRICTED_PROFILE.to_string(),
            is_restricted: true,
            credential: Some(CredentialAuth::hash_credential("0000")?),
            daily_limit: MinuteLimit::Minutes(120),
            session_limit: MinuteLimit::Minutes(45),
            rest_minutes: 15,
            blocked_apps: BTreeSet::new(),
        },
        Profile {
            id: 0,
            name: DEFAULT_PARENT_PROFILE.to_string(),
            is_restricted: false,
            credential: Some(CredentialAuth::hash_credential("1234")?),
            daily_limit: MinuteLimit::Unlimited,
            session_limit: MinuteLimit::Unlimited,
            rest_minutes: 0,
            blocked_apps: BTreeSet::new(),
        },
    ])
}
