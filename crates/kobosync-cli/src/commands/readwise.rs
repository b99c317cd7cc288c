//! Readwise command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use kobosync_core::readwise::push_from_config;
use kobosync_core::Config;

use crate::output::Output;

/// Push every highlight to Readwise
pub fn push(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let token = config.readwise_token()?;

    let report = push_from_config(&config, &token)?;
    output.print_push_report(&report);

    Ok(())
}
