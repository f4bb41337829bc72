use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::platform::common::{read_json, restrict_to_owner, write_json_atomic};
use crate::screen_time::error::{StoreError, StoreResult};
use crate::screen_time::profile::{default_profiles, Profile, ProfileId};

/// Current on-disk table version
const TABLE_VERSION: &str = "1.0";

const PROFILES_FILE: &str = "profiles.json";
const USAGE_FILE: &str = "usage.json";
const SESSION_FILE: &str = "session.json";

/// Durable profile table
pub trait ProfileStore: Send + Sync {
    fn get(&self, id: ProfileId) -> StoreResult<Option<Profile>>;

    fn get_by_name(&self, name: &str) -> StoreResult<Option<Profile>>;

    fn list(&self) -> StoreResult<Vec<Profile>>;

    /// Insert or replace a profile. New profiles (`id == 0`) get an id assigned.
    fn upsert(&self, profile: Profile) -> StoreResult<Profile>;
}

/// Durable per-(profile, day) usage counter
pub trait UsageLedger: Send + Sync {
    fn get_usage(&self, profile_id: ProfileId, date: NaiveDate) -> StoreResult<Option<u32>>;

    /// Idempotent upsert of the day's total
    fn set_usage(&self, profile_id: ProfileId, date: NaiveDate, minutes: u32) -> StoreResult<()>;
}

/// Durable session bookkeeping: last active profile, last session end, and
/// per-profile session snapshots
pub trait SessionStore: Send + Sync {
    fn load_session_state(&self) -> StoreResult<SessionState>;

    fn set_last_active_profile(&self, name: &str) -> StoreResult<()>;

    fn set_last_session_end(&self, at: DateTime<Local>) -> StoreResult<()>;

    fn save_snapshot(&self, profile_id: ProfileId, snapshot: SessionSnapshot) -> StoreResult<()>;
}

/// One usage record per profile per day
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UsageRecord {
    pub profile_id: ProfileId,
    pub date: NaiveDate,
    pub total_minutes: u32,
}

/// Session usage of a profile at the moment its session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionSnapshot {
    pub session_minutes: u32,
    pub ended_at: DateTime<Local>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionState {
    /// Shown by the UI on cold start before the engine reports anything
    #[serde(default)]
    pub last_active_profile: Option<String>,

    /// When the display last went off
    #[serde(default)]
    pub last_session_end: Option<DateTime<Local>>,

    #[serde(default)]
    pub sessions: BTreeMap<ProfileId, SessionSnapshot>,
}

/// Seed the default "Child"/"Parent" profiles into an empty store
pub fn seed_defaults(store: &dyn ProfileStore) -> Result<usize> {
    if !store.list()?.is_empty() {
        return Ok(0);
    }

    let defaults = default_profiles()?;
    let count = defaults.len();
    for profile in defaults {
        let stored = store.upsert(profile)?;
        info!("Seeded default profile: {} ({})", stored.name, stored.id);
    }

    Ok(count)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ProfileTable {
    version: String,
    next_id: ProfileId,
    profiles: Vec<Profile>,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION.to_string(),
            next_id: 1,
            profiles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct UsageTable {
    version: String,
    records: Vec<UsageRecord>,
}

impl Default for UsageTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION.to_string(),
            records: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SessionTable {
    version: String,
    #[serde(default)]
    state: SessionState,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION.to_string(),
            state: SessionState::default(),
        }
    }
}

/// JSON-file backed store holding the profile, usage and session tables
/// under one data directory. Every write replaces the file atomically.
pub struct JsonStore {
    profiles_path: PathBuf,
    usage_path: PathBuf,
    session_path: PathBuf,
    profiles: Mutex<ProfileTable>,
    usage: Mutex<UsageTable>,
    session: Mutex<SessionTable>,
}

impl JsonStore {
    /// Open (or lazily create) the tables in `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        let profiles_path = data_dir.join(PROFILES_FILE);
        let usage_path = data_dir.join(USAGE_FILE);
        let session_path = data_dir.join(SESSION_FILE);

        // Never discard profiles silently; they carry credentials
        let profiles = load_profile_table(&profiles_path)
            .with_context(|| format!("Failed to load {}", profiles_path.display()))?;

        let mut usage: UsageTable = read_json(&usage_path)?.unwrap_or_default();
        if usage.version != TABLE_VERSION {
            warn!(
                "Usage table version mismatch (expected {}, got {}). Starting a new ledger.",
                TABLE_VERSION, usage.version
            );
            usage = UsageTable::default();
        }

        let mut session: SessionTable = read_json(&session_path)?.unwrap_or_default();
        if session.version != TABLE_VERSION {
            warn!(
                "Session table version mismatch (expected {}, got {}). Starting fresh.",
                TABLE_VERSION, session.version
            );
            session = SessionTable::default();
        }

        Ok(Self {
            profiles_path,
            usage_path,
            session_path,
            profiles: Mutex::new(profiles),
            usage: Mutex::new(usage),
            session: Mutex::new(session),
        })
    }

    /// Open the store and seed the default profiles on first run
    pub fn open_seeded(data_dir: &Path) -> Result<Self> {
        let store = Self::open(data_dir)?;
        seed_defaults(&store).context("Failed to seed default profiles")?;
        Ok(store)
    }

    fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
        mutex.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Lock the profile table and replace it with what is on disk. Other
    /// processes (`profiles add`, `profiles edit`) write the same file while
    /// the engine runs.
    fn current_profiles(&self) -> StoreResult<MutexGuard<'_, ProfileTable>> {
        let mut table = Self::lock(&self.profiles)?;
        *table = load_profile_table(&self.profiles_path)?;
        Ok(table)
    }

    fn persist<T: Serialize>(table: &'static str, path: &Path, value: &T) -> StoreResult<()> {
        write_json_atomic(path, value).map_err(|e| StoreError::Write {
            table,
            message: format!("{:#}", e),
        })
    }
}

/// Read `profiles.json`, or an empty table if it does not exist yet
fn load_profile_table(path: &Path) -> StoreResult<ProfileTable> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProfileTable::default()),
        Err(e) => return Err(StoreError::Io(e)),
    };

    let table: ProfileTable = serde_json::from_str(&content)?;
    if table.version != TABLE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            table: "profiles",
            version: table.version,
        });
    }
    Ok(table)
}

impl ProfileStore for JsonStore {
    fn get(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        let table = self.current_profiles()?;
        Ok(table.profiles.iter().find(|p| p.id == id).cloned())
    }

    fn get_by_name(&self, name: &str) -> StoreResult<Option<Profile>> {
        let table = self.current_profiles()?;
        Ok(table.profiles.iter().find(|p| p.name == name).cloned())
    }

    fn list(&self) -> StoreResult<Vec<Profile>> {
        let table = self.current_profiles()?;
        Ok(table.profiles.clone())
    }

    fn upsert(&self, mut profile: Profile) -> StoreResult<Profile> {
        profile.validate()?;

        let mut table = self.current_profiles()?;

        if table
            .profiles
            .iter()
            .any(|p| p.name == profile.name && p.id != profile.id)
        {
            return Err(StoreError::DuplicateName(profile.name));
        }

        // Commit to the cache only after the file write succeeded
        let mut updated = table.clone();
        if profile.id == 0 {
            profile.id = updated.next_id;
            updated.next_id += 1;
            updated.profiles.push(profile.clone());
        } else if let Some(existing) = updated.profiles.iter_mut().find(|p| p.id == profile.id) {
            *existing = profile.clone();
        } else {
            updated.next_id = updated.next_id.max(profile.id + 1);
            updated.profiles.push(profile.clone());
        }

        Self::persist("profiles", &self.profiles_path, &updated)?;
        if let Err(e) = restrict_to_owner(&self.profiles_path) {
            warn!("Failed to restrict profile table permissions: {:#}", e);
        }

        *table = updated;
        Ok(profile)
    }
}

impl UsageLedger for JsonStore {
    fn get_usage(&self, profile_id: ProfileId, date: NaiveDate) -> StoreResult<Option<u32>> {
        let table = Self::lock(&self.usage)?;
        Ok(table
            .records
            .iter()
            .find(|r| r.profile_id == profile_id && r.date == date)
            .map(|r| r.total_minutes))
    }

    fn set_usage(&self, profile_id: ProfileId, date: NaiveDate, minutes: u32) -> StoreResult<()> {
        let mut table = Self::lock(&self.usage)?;

        let mut updated = table.clone();
        match updated
            .records
            .iter_mut()
            .find(|r| r.profile_id == profile_id && r.date == date)
        {
            Some(record) => record.total_minutes = minutes,
            None => updated.records.push(UsageRecord {
                profile_id,
                date,
                total_minutes: minutes,
            }),
        }

        Self::persist("usage", &self.usage_path, &updated)?;
        *table = updated;
        Ok(())
    }
}

impl SessionStore for JsonStore {
    fn load_session_state(&self) -> StoreResult<SessionState> {
        let table = Self::lock(&self.session)?;
        Ok(table.state.clone())
    }

    fn set_last_active_profile(&self, name: &str) -> StoreResult<()> {
        let mut table = Self::lock(&self.session)?;
        let mut updated = table.clone();
        updated.state.last_active_profile = Some(name.to_string());
        Self::persist("session", &self.session_path, &updated)?;
        *table = updated;
        Ok(())
    }

    fn set_last_session_end(&self, at: DateTime<Local>) -> StoreResult<()> {
        let mut table = Self::lock(&self.session)?;
        let mut updated = table.clone();
        updated.state.last_session_end = Some(at);
        Self::persist("session", &self.session_path, &updated)?;
        *table = updated;
        Ok(())
    }

    fn save_snapshot(&self, profile_id: ProfileId, snapshot: SessionSnapshot) -> StoreResult<()> {
        let mut table = Self::lock(&self.session)?;
        let mut updated = table.clone();
        updated.state.sessions.insert(profile_id, snapshot);
        Self::persist("session", &self.session_path, &updated)?;
        *table = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen_time::profile::MinuteLimit;
    use chrono::TimeZone;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn restricted(name: &str) -> Profile {
        Profile {
            id: 0,
            name: name.to_string(),
            is_restricted: true,
            credential: None,
            daily_limit: MinuteLimit::Minutes(60),
            session_limit: MinuteLimit::Minutes(30),
            rest_minutes: 10,
            blocked_apps: BTreeSet::new(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_upsert_assigns_ids_and_persists() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let a = store.upsert(restricted("Alice")).unwrap();
        let b = store.upsert(restricted("Bob")).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 2);
        assert_eq!(reopened.get_by_name("Bob").unwrap().unwrap().id, 2);
        assert_eq!(reopened.get(1).unwrap().unwrap().name, "Alice");
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let mut alice = store.upsert(restricted("Alice")).unwrap();
        alice.daily_limit = MinuteLimit::Minutes(90);
        store.upsert(alice.clone()).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.get(alice.id).unwrap().unwrap().daily_limit, MinuteLimit::Minutes(90));
    }

    #[test]
    fn test_upsert_rejects_duplicate_names() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        store.upsert(restricted("Alice")).unwrap();
        let result = store.upsert(restricted("Alice"));
        assert!(matches!(result, Err(StoreError::DuplicateName(_))));
    }

    #[test]
    fn test_upsert_rejects_unrestricted_without_credential() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let mut parent = restricted("Parent");
        parent.is_restricted = false;
        assert!(matches!(store.upsert(parent), Err(StoreError::InvalidProfile(_))));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_seed_defaults_only_once() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        assert_eq!(seed_defaults(&store).unwrap(), 2);
        assert_eq!(seed_defaults(&store).unwrap(), 0);
        assert!(store.get_by_name("Child").unwrap().is_some());
        assert!(store.get_by_name("Parent").unwrap().is_some());
    }

    #[test]
    fn test_usage_upsert_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        assert_eq!(store.get_usage(1, day()).unwrap(), None);

        store.set_usage(1, day(), 5).unwrap();
        store.set_usage(1, day(), 6).unwrap();
        store.set_usage(1, day(), 6).unwrap();

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get_usage(1, day()).unwrap(), Some(6));
        assert_eq!(reopened.usage.lock().unwrap().records.len(), 1);
    }

    #[test]
    fn test_usage_is_keyed_by_profile_and_day() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let next_day = day().succ_opt().unwrap();

        store.set_usage(1, day(), 30).unwrap();
        store.set_usage(2, day(), 10).unwrap();
        store.set_usage(1, next_day, 3).unwrap();

        assert_eq!(store.get_usage(1, day()).unwrap(), Some(30));
        assert_eq!(store.get_usage(2, day()).unwrap(), Some(10));
        assert_eq!(store.get_usage(1, next_day).unwrap(), Some(3));
    }

    #[test]
    fn test_session_state_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        let ended_at = Local.with_ymd_and_hms(2026, 10, 16, 18, 30, 0).unwrap();

        store.set_last_active_profile("Parent").unwrap();
        store.set_last_session_end(ended_at).unwrap();
        store
            .save_snapshot(1, SessionSnapshot { session_minutes: 40, ended_at })
            .unwrap();

        let state = JsonStore::open(dir.path()).unwrap().load_session_state().unwrap();
        assert_eq!(state.last_active_profile.as_deref(), Some("Parent"));
        assert_eq!(state.last_session_end, Some(ended_at));
        assert_eq!(state.sessions.get(&1).unwrap().session_minutes, 40);
    }

    #[test]
    fn test_open_rejects_unknown_profile_table_version() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROFILES_FILE),
            r#"{"version":"9.9","next_id":1,"profiles":[]}"#,
        )
        .unwrap();

        assert!(JsonStore::open(dir.path()).is_err());
    }

    #[test]
    fn test_profile_edits_visible_across_handles() {
        let dir = tempdir().unwrap();
        let engine_side = JsonStore::open_seeded(dir.path()).unwrap();
        let cli_side = JsonStore::open(dir.path()).unwrap();

        let mut child = cli_side.get_by_name("Child").unwrap().unwrap();
        child.daily_limit = MinuteLimit::Minutes(5);
        cli_side.upsert(child.clone()).unwrap();
        let added = cli_side.upsert(restricted("Teen")).unwrap();

        assert_eq!(
            engine_side.get(child.id).unwrap().unwrap().daily_limit,
            MinuteLimit::Minutes(5)
        );
        assert_eq!(engine_side.get(added.id).unwrap().unwrap().name, "Teen");
        assert_eq!(engine_side.list().unwrap().len(), 3);

        // Ids assigned by either handle never collide
        let next = engine_side.upsert(restricted("Guest")).unwrap();
        assert_eq!(next.id, added.id + 1);
    }

    #[test]
    fn test_corrupt_profile_table_reports_serialization_error() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open_seeded(dir.path()).unwrap();
        std::fs::write(dir.path().join(PROFILES_FILE), "{not json").unwrap();

        assert!(matches!(store.list(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_profile_table_version_checked_on_reload() {
        let dir = tempdir().unwrap();
        let store = JsonStore::open_seeded(dir.path()).unwrap();
        std::fs::write(
            dir.path().join(PROFILES_FILE),
            r#"{"version":"9.9","next_id":1,"profiles":[]}"#,
        )
        .unwrap();

        assert!(matches!(
            store.get(1),
            Err(StoreError::UnsupportedVersion { table: "profiles", .. })
        ));
    }

    #[test]
    fn test_open_resets_unknown_usage_table_version() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(USAGE_FILE), r#"{"version":"0.1","records":[]}"#).unwrap();

        let store = JsonStore::open(dir.path()).unwrap();
        assert_eq!(store.get_usage(1, day()).unwrap(), None);
    }
}
