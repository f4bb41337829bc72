use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config;
mod platform;
mod screen_time;

use cli::{Args, Commands, ProfileCommands};
use commands::profiles::ProfileEdit;
use commands::utils::init_logging;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => config::get_config_path()?,
    };

    let verbose = args.verbose;
    let load_config = || -> Result<config::AppConfig> {
        let app_config = config::AppConfig::load_or_default(&config_path)?;
        init_logging(verbose, &app_config.logging.level);
        Ok(app_config)
    };

    match args.command {
        Commands::Init { data_dir, force } => {
            // Init must work before a (valid) config file exists
            init_logging(verbose, "info");
            commands::setup::init(&config_path, data_dir, force)
        }
        Commands::Run => commands::run::run(&load_config()?),
        Commands::Status => commands::status::status(&load_config()?),
        Commands::Switch { name, pin } => {
            commands::profiles::switch(&load_config()?, &name, pin)
        }
        Commands::Profiles { command } => run_profile_command(&load_config()?, command),
    }
}

fn run_profile_command(app_config: &config::AppConfig, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::List => commands::profiles::list(app_config),
        ProfileCommands::Add {
            name,
            unrestricted,
            pin,
            daily,
            session,
            rest,
        } => commands::profiles::add(app_config, name, unrestricted, pin, daily, session, rest),
        ProfileCommands::Edit {
            name,
            daily,
            session,
            rest,
            pin,
            block,
            unblock,
        } => commands::profiles::edit(
            app_config,
            &name,
            ProfileEdit {
                daily,
                session,
                rest,
                pin,
                block,
                unblock,
            },
        ),
    }
}
