use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::screen_time::store::seed_defaults;
use crate::screen_time::JsonStore;

/// Write a default configuration file and seed the default profiles
pub fn init(config_path: &Path, data_dir: Option<PathBuf>, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}\nUse --force to overwrite",
            config_path.display()
        );
    }

    let mut config = AppConfig::default();
    config.storage.data_dir = data_dir;
    config.validate()?;

    let data_dir = config.storage.resolve_data_dir()?;
    if config.storage.data_dir.is_none() {
        config.storage.data_dir = Some(data_dir.clone());
    }
    config.save(config_path)?;
    println!("✓ Configuration saved to: {}", config_path.display());

    let store = JsonStore::open(&data_dir)?;
    let seeded = seed_defaults(&store)?;
    if seeded > 0 {
        println!("✓ Seeded {} default profiles in {}", seeded, data_dir.display());
        println!();
        println!("Default PINs: Child = 0000, Parent = 1234");
        println!("Change them with: screen-limit profiles edit <name> --pin <new pin>");
    } else {
        println!("✓ Existing profiles kept in {}", data_dir.display());
    }

    println!();
    println!("Start the enforcer: screen-limit run");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen_time::ProfileStore;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_config_and_profiles() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data");

        init(&config_path, Some(data_dir.clone()), false).unwrap();

        let config = AppConfig::load(&config_path).unwrap();
        assert_eq!(config.storage.data_dir, Some(data_dir.clone()));
        let store = JsonStore::open(&data_dir).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data");

        init(&config_path, Some(data_dir.clone()), false).unwrap();
        assert!(init(&config_path, Some(data_dir.clone()), false).is_err());
        assert!(init(&config_path, Some(data_dir), true).is_ok());
    }
}
