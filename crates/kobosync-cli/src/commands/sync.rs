//! Sync command handler

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use kobosync_core::{run_sync, Config};

use crate::output::Output;

/// Run one incremental sync
///
/// Only a fatal error (database or store unusable) fails the command; books
/// that could not be written are listed in the summary.
pub fn sync(config_path: Option<&PathBuf>, dry_run: bool, output: &Output) -> Result<()> {
    let config = load_sync_config(config_path)?;
    debug!(
        "database {:?}, base path {}",
        config.database_path,
        config.base_path()
    );

    let report = run_sync(&config, dry_run)?;
    output.print_sync_report(&report);

    Ok(())
}

/// Load configuration and check the store settings
pub fn load_sync_config(config_path: Option<&PathBuf>) -> Result<Config> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    if config.local_dir.is_none() {
        config.validate_webdav().context(
            "WebDAV not configured. Set it with:\n  \
             kobosync config set webdav.url https://dav.example.com/\n  \
             kobosync config set webdav.username <user>\n  \
             kobosync config set webdav.password <password>\n\
             or sync into a folder with:\n  \
             kobosync config set local_dir <path>",
        )?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_sync_config_requires_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "database_path = \"/tmp/KoboReader.sqlite\"\n").unwrap();

        let err = load_sync_config(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("webdav.url is required"));
    }

    #[test]
    fn test_load_sync_config_accepts_local_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "local_dir = \"/tmp/highlights\"\n").unwrap();

        let config = load_sync_config(Some(&path)).unwrap();
        assert_eq!(config.base_path(), "/");
    }
}
