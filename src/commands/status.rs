use anyhow::Result;
use chrono::Local;

use crate::config::AppConfig;
use crate::screen_time::{summarize_profiles, SessionStore};

use super::utils::{format_duration, open_store};

/// Show the last active profile and today's usage
pub fn status(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let now = Local::now();
    let session = store.load_session_state()?;

    println!("Screen Time Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match &session.last_active_profile {
        Some(name) => println!("Active profile:   {}", name),
        None => println!("Active profile:   (engine not run yet)"),
    }

    if let Some(ended) = session.last_session_end {
        println!(
            "Last session end: {} ({} ago)",
            ended.format("%Y-%m-%d %H:%M:%S"),
            format_duration(now - ended)
        );
    }

    println!();
    println!("Today ({}):", now.format("%Y-%m-%d"));
    for usage in summarize_profiles(store.as_ref(), store.as_ref(), store.as_ref(), now)? {
        if usage.is_restricted {
            println!(
                "  {:<12} {:>4}m of {:<9} session {:>3}m of {}",
                usage.name,
                usage.daily_usage,
                usage.daily_limit.to_string(),
                usage.session_usage,
                usage.session_limit
            );
        } else {
            println!("  {:<12} {:>4}m (no limits)", usage.name, usage.daily_usage);
        }
    }

    Ok(())
}
