//! In-memory stores and a manual clock for engine tests

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::screen_time::clock::Clock;
use crate::screen_time::error::{StoreError, StoreResult};
use crate::screen_time::profile::{MinuteLimit, Profile, ProfileId};
use crate::screen_time::store::{
    ProfileStore, SessionSnapshot, SessionState, SessionStore, UsageLedger,
};

pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// 2026-10-16 17:00 local time
    pub fn afternoon() -> Self {
        Self::new(Local.with_ymd_and_hms(2026, 10, 16, 17, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Local>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

/// Profile, usage and session tables in memory. `fail_usage_writes` and
/// `fail_usage_reads` make `set_usage` / `get_usage` return an error.
#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<Vec<Profile>>,
    usage: Mutex<BTreeMap<(ProfileId, NaiveDate), u32>>,
    session: Mutex<SessionState>,
    fail_usage_writes: AtomicBool,
    fail_usage_reads: AtomicBool,
}

impl MemoryStore {
    pub fn with_profiles(profiles: Vec<Profile>) -> Self {
        let store = Self::default();
        *store.profiles.lock().unwrap() = profiles;
        store
    }

    pub fn set_fail_usage_writes(&self, fail: bool) {
        self.fail_usage_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_usage_reads(&self, fail: bool) {
        self.fail_usage_reads.store(fail, Ordering::SeqCst);
    }

    pub fn session_state(&self) -> SessionState {
        self.session.lock().unwrap().clone()
    }
}

impl ProfileStore for MemoryStore {
    fn get(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    fn get_by_name(&self, name: &str) -> StoreResult<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().iter().find(|p| p.name == name).cloned())
    }

    fn list(&self) -> StoreResult<Vec<Profile>> {
        Ok(self.profiles.lock().unwrap().clone())
    }

    fn upsert(&self, mut profile: Profile) -> StoreResult<Profile> {
        profile.validate()?;
        let mut profiles = self.profiles.lock().unwrap();
        if profile.id == 0 {
            profile.id = profiles.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        }
        match profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        Ok(profile)
    }
}

impl UsageLedger for MemoryStore {
    fn get_usage(&self, profile_id: ProfileId, date: NaiveDate) -> StoreResult<Option<u32>> {
        if self.fail_usage_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("usage table unreadable")));
        }
        Ok(self.usage.lock().unwrap().get(&(profile_id, date)).copied())
    }

    fn set_usage(&self, profile_id: ProfileId, date: NaiveDate, minutes: u32) -> StoreResult<()> {
        if self.fail_usage_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                table: "usage",
                message: "disk full".to_string(),
            });
        }
        self.usage.lock().unwrap().insert((profile_id, date), minutes);
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    fn load_session_state(&self) -> StoreResult<SessionState> {
        Ok(self.session.lock().unwrap().clone())
    }

    fn set_last_active_profile(&self, name: &str) -> StoreResult<()> {
        self.session.lock().unwrap().last_active_profile = Some(name.to_string());
        Ok(())
    }

    fn set_last_session_end(&self, at: DateTime<Local>) -> StoreResult<()> {
        self.session.lock().unwrap().last_session_end = Some(at);
        Ok(())
    }

    fn save_snapshot(&self, profile_id: ProfileId, snapshot: SessionSnapshot) -> StoreResult<()> {
        self.session.lock().unwrap().sessions.insert(profile_id, snapshot);
        Ok(())
    }
}

/// Restricted "Child" (id 1): daily 120, session 45, rest 15
pub fn child_profile() -> Profile {
    Profile {
        id: 1,
        name: "Child".to_string(),
        is_restricted: true,
        credential: None,
        daily_limit: MinuteLimit::Minutes(120),
        session_limit: MinuteLimit::Minutes(45),
        rest_minutes: 15,
        blocked_apps: BTreeSet::from(["com.example.arcade".to_string()]),
    }
}

/// Unrestricted "Parent" (id 2)
pub fn parent_profile() -> Profile {
    Profile {
        id: 2,
        name: "Parent".to_string(),
        is_restricted: false,
        credential: Some("hash".to_string()),
        daily_limit: MinuteLimit::Unlimited,
        session_limit: MinuteLimit::Unlimited,
        rest_minutes: 0,
        blocked_apps: BTreeSet::from(["com.example.arcade".to_string()]),
    }
}
