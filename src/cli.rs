use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::screen_time::MinuteLimit;

/// Screen Time Enforcer
///
/// Tracks per-profile daily and session viewing time on a shared device,
/// warns when a limit is crossed and locks the device after a countdown.
#[derive(Parser, Debug)]
#[command(name = "screen-limit")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (defaults to the system location)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the enforcement engine, reading JSON events from stdin
    Run,
    /// Write a default configuration and seed the default profiles
    Init {
        /// Directory for profile and usage data
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Show the last active profile and today's usage
    Status,
    /// Manage profiles
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Verify a profile PIN and print the switch event for `run`
    Switch {
        /// Profile name
        name: String,

        /// PIN (prompted for if omitted)
        #[arg(long)]
        pin: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List profiles with today's usage
    List,
    /// Add a profile
    Add {
        name: String,

        /// Exempt the profile from all limits (requires --pin)
        #[arg(long)]
        unrestricted: bool,

        #[arg(long)]
        pin: Option<String>,

        /// Daily limit in minutes, or "unlimited"
        #[arg(long, value_parser = parse_limit, default_value = "120")]
        daily: MinuteLimit,

        /// Session limit in minutes, or "unlimited"
        #[arg(long, value_parser = parse_limit, default_value = "45")]
        session: MinuteLimit,

        /// Mandatory rest between sessions in minutes
        #[arg(long, default_value = "15")]
        rest: u32,
    },
    /// Change limits, PIN or blocked apps of a profile
    Edit {
        name: String,

        #[arg(long, value_parser = parse_limit)]
        daily: Option<MinuteLimit>,

        #[arg(long, value_parser = parse_limit)]
        session: Option<MinuteLimit>,

        #[arg(long)]
        rest: Option<u32>,

        #[arg(long)]
        pin: Option<String>,

        /// App identifier to block (repeatable)
        #[arg(long)]
        block: Vec<String>,

        /// App identifier to unblock (repeatable)
        #[arg(long)]
        unblock: Vec<String>,
    },
}

/// Parse "unlimited", "-1" or a minute count
pub fn parse_limit(value: &str) -> Result<MinuteLimit, String> {
    if value.eq_ignore_ascii_case("unlimited") {
        return Ok(MinuteLimit::Unlimited);
    }

    let minutes: i64 = value
        .parse()
        .map_err(|_| format!("expected minutes or \"unlimited\", got '{}'", value))?;
    MinuteLimit::try_from(minutes)
}
