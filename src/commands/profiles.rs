use anyhow::{Context, Result};
use chrono::Local;
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};

use crate::config::AppConfig;
use crate::screen_time::{
    summarize_profiles, CredentialAuth, EngineEvent, MinuteLimit, Profile, ProfileStore,
    RateLimiter,
};

use super::utils::open_store;

const MAX_PIN_ATTEMPTS: usize = 3;
const PIN_WINDOW_SECS: u64 = 60;

/// Changes requested by `profiles edit`
#[derive(Debug, Default)]
pub struct ProfileEdit {
    pub daily: Option<MinuteLimit>,
    pub session: Option<MinuteLimit>,
    pub rest: Option<u32>,
    pub pin: Option<String>,
    pub block: Vec<String>,
    pub unblock: Vec<String>,
}

impl ProfileEdit {
    pub fn apply(self, profile: &mut Profile) -> Result<()> {
        if let Some(daily) = self.daily {
            profile.daily_limit = daily;
        }
        if let Some(session) = self.session {
            profile.session_limit = session;
        }
        if let Some(rest) = self.rest {
            profile.rest_minutes = rest;
        }
        if let Some(pin) = self.pin {
            profile.credential = Some(CredentialAuth::hash_credential(&pin)?);
        }
        for app in self.unblock {
            profile.blocked_apps.remove(&app);
        }
        profile.blocked_apps.extend(self.block);
        Ok(())
    }
}

pub fn list(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let profiles = store.list()?;
    let usage = summarize_profiles(store.as_ref(), store.as_ref(), store.as_ref(), Local::now())?;

    println!(
        "{:<4} {:<12} {:<12} {:>9} {:>9} {:>6} {:>7}  {}",
        "ID", "NAME", "TYPE", "DAILY", "SESSION", "REST", "TODAY", "BLOCKED"
    );
    for (profile, usage) in profiles.iter().zip(usage.iter()) {
        let kind = if profile.is_restricted { "restricted" } else { "unrestricted" };
        let blocked = profile
            .blocked_apps
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<4} {:<12} {:<12} {:>9} {:>9} {:>5}m {:>6}m  {}",
            profile.id,
            profile.name,
            kind,
            profile.daily_limit.to_string(),
            profile.session_limit.to_string(),
            profile.rest_minutes,
            usage.daily_usage,
            blocked
        );
    }

    Ok(())
}

pub fn add(
    config: &AppConfig,
    name: String,
    unrestricted: bool,
    pin: Option<String>,
    daily: MinuteLimit,
    session: MinuteLimit,
    rest: u32,
) -> Result<()> {
    let store = open_store(config)?;

    let credential = pin
        .map(|pin| CredentialAuth::hash_credential(&pin))
        .transpose()?;
    let profile = Profile {
        id: 0,
        name,
        is_restricted: !unrestricted,
        credential,
        daily_limit: daily,
        session_limit: session,
        rest_minutes: rest,
        blocked_apps: BTreeSet::new(),
    };

    let stored = store.upsert(profile).context("Failed to add profile")?;
    println!("✓ Added profile {} (id {})", stored.name, stored.id);

    Ok(())
}

/// Apply `edit` and print the config-changed event for a running engine
pub fn edit(config: &AppConfig, name: &str, edit: ProfileEdit) -> Result<()> {
    let store = open_store(config)?;
    let event = edit_profile(store.as_ref(), name, edit)?;

    eprintln!("✓ Updated profile {}", name);
    println!("{}", serde_json::to_string(&event)?);

    Ok(())
}

pub fn edit_profile(store: &dyn ProfileStore, name: &str, edit: ProfileEdit) -> Result<EngineEvent> {
    let mut profile = store
        .get_by_name(name)?
        .with_context(|| format!("Profile not found: {}", name))?;

    edit.apply(&mut profile)?;
    let stored = store.upsert(profile).context("Failed to update profile")?;

    Ok(EngineEvent::ProfileConfigChanged {
        profile_id: stored.id,
    })
}

/// Verify the PIN and print the switch event for a running engine
pub fn switch(config: &AppConfig, name: &str, pin: Option<String>) -> Result<()> {
    let store = open_store(config)?;
    let profile = store
        .get_by_name(name)?
        .with_context(|| format!("Profile not found: {}", name))?;

    let authorized = match pin {
        Some(pin) => CredentialAuth::authorize_switch(&profile, Some(&pin))?,
        None if profile.requires_credential() => prompt_for_pin(&profile)?,
        None => true,
    };
    if !authorized {
        anyhow::bail!("Incorrect PIN for profile {}", name);
    }

    let event = switch_event(&profile);
    tracing::info!("Switch to {} authorized", profile.name);
    println!("{}", serde_json::to_string(&event)?);

    Ok(())
}

pub fn switch_event(profile: &Profile) -> EngineEvent {
    EngineEvent::ProfileSwitchRequested {
        profile_id: profile.id,
    }
}

fn prompt_for_pin(profile: &Profile) -> Result<bool> {
    let mut limiter = RateLimiter::new(MAX_PIN_ATTEMPTS, PIN_WINDOW_SECS);
    let stdin = io::stdin();
    let mut input = stdin.lock();

    while limiter.is_allowed() {
        eprint!("PIN for {}: ", profile.name);
        io::stderr().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }

        if CredentialAuth::authorize_switch(profile, Some(line.trim()))? {
            return Ok(true);
        }
        eprintln!("Incorrect PIN");
    }

    if let Some(wait) = limiter.time_until_allowed() {
        eprintln!("Too many attempts, try again in {}s", wait.as_secs());
    }
    Ok(false)
}
