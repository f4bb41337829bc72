use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::screen_time::JsonStore;

/// Initialize logging. `RUST_LOG` wins, then `--verbose`, then the
/// configured level.
pub fn init_logging(verbose: bool, level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose { "debug" } else { level };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Open the configured data directory, seeding default profiles on first use
pub fn open_store(config: &AppConfig) -> Result<Arc<JsonStore>> {
    let data_dir = config.storage.resolve_data_dir()?;
    tracing::debug!("Data directory: {}", data_dir.display());
    Ok(Arc::new(JsonStore::open_seeded(&data_dir)?))
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::minutes(15)), "15m");
        assert_eq!(format_duration(Duration::hours(3)), "3h");
        assert_eq!(format_duration(Duration::days(2)), "2d");
    }

    #[test]
    fn test_open_store_seeds_profiles() {
        use crate::screen_time::ProfileStore;

        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());

        let store = open_store(&config).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }
}
