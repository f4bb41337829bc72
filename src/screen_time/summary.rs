use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use crate::screen_time::error::StoreResult;
use crate::screen_time::profile::{MinuteLimit, ProfileId};
use crate::screen_time::store::{ProfileStore, SessionStore, UsageLedger};

/// Per-profile usage as shown on the profile selection screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUsage {
    pub id: ProfileId,
    pub name: String,
    pub is_restricted: bool,
    pub daily_usage: u32,
    pub daily_limit: MinuteLimit,
    pub session_usage: u32,
    pub session_limit: MinuteLimit,
}

/// Summarize today's usage for every profile.
///
/// A profile's last session still counts while its rest period has not
/// elapsed; after that it starts from zero.
pub fn summarize_profiles(
    profiles: &dyn ProfileStore,
    ledger: &dyn UsageLedger,
    sessions: &dyn SessionStore,
    now: DateTime<Local>,
) -> StoreResult<Vec<ProfileUsage>> {
    let today = now.date_naive();
    let saved = sessions.load_session_state()?;

    profiles
        .list()?
        .into_iter()
        .map(|profile| -> StoreResult<ProfileUsage> {
            let daily_usage = ledger.get_usage(profile.id, today)?.unwrap_or(0);

            let rest = Duration::minutes(i64::from(profile.rest_minutes));
            let session_usage = match saved.sessions.get(&profile.id) {
                Some(snapshot) if now - snapshot.ended_at < rest => snapshot.session_minutes,
                _ => 0,
            };

            Ok(ProfileUsage {
                id: profile.id,
                name: profile.name,
                is_restricted: profile.is_restricted,
                daily_usage,
                daily_limit: profile.daily_limit,
                session_usage,
                session_limit: profile.session_limit,
            })
        })
        .collect()
}
