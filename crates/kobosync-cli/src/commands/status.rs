//! Status command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use kobosync_core::sync::CursorStore;
use kobosync_core::{open_store, Config};

use crate::output::{Output, OutputFormat};

/// Show where highlights go and when they were last synced
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    let remote = open_store(&config).context("Unable to open the configured store")?;
    let cursors = CursorStore::new(&remote, config.base_path());
    let cursor = cursors.get();
    let last_sync = (!cursor.is_epoch()).then(|| cursor.to_rfc3339());

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "store": remote.describe(),
                    "base_path": config.base_path(),
                    "database_path": config.database_path,
                    "database_exists": config.database_path.exists(),
                    "last_sync": last_sync,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", cursor);
        }
        OutputFormat::Human => {
            println!("kobosync Status");
            println!("===============");
            println!();
            println!("Source:");
            println!("  Database: {}", config.database_path.display());
            if !config.database_path.exists() {
                println!("  ⚠ database not found");
            }
            println!();
            println!("Store:");
            println!("  Location: {}", remote.describe());
            println!("  Folder:   {}", config.base_path());
            println!();
            println!("Last sync: {}", cursor);
        }
    }

    Ok(())
}
