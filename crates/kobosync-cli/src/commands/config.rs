//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use kobosync_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "database_path, ca_cert_dir, template_path, header_template_path, \
     write_backup, local_dir, webdav.url, webdav.username, webdav.password, \
     webdav.base_path, readwise.token, readwise.token_path, readwise.api_url";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "database_path": config.database_path,
                    "ca_cert_dir": config.ca_cert_dir,
                    "template_path": config.template_path,
                    "header_template_path": config.header_template_path,
                    "write_backup": config.write_backup,
                    "local_dir": config.local_dir,
                    "base_path": config.base_path(),
                    "webdav": {
                        "url": config.webdav.url,
                        "username": config.webdav.username,
                        "password_set": !config.webdav.password.is_empty(),
                    },
                    "readwise": {
                        "api_url": config.readwise.api_url,
                        "token_set": config.readwise.token.is_some(),
                        "token_path": config.readwise.token_path,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.database_path.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  database_path:        {}", config.database_path.display());
            println!("  ca_cert_dir:          {}", display_path(config.ca_cert_dir.as_deref()));
            println!("  template_path:        {}", display_path(config.template_path.as_deref()));
            println!(
                "  header_template_path: {}",
                display_path(config.header_template_path.as_deref())
            );
            println!("  write_backup:         {}", config.write_backup);
            println!("  local_dir:            {}", display_path(config.local_dir.as_deref()));
            println!("  webdav.url:           {}", or_unset(&config.webdav.url));
            println!("  webdav.username:      {}", or_unset(&config.webdav.username));
            println!("  webdav.password:      {}", secret(&config.webdav.password));
            println!("  webdav.base_path:     {}", config.base_path());
            println!("  readwise.api_url:     {}", config.readwise.api_url);
            println!(
                "  readwise.token:       {}",
                secret(config.readwise.token.as_deref().unwrap_or(""))
            );
            println!(
                "  readwise.token_path:  {}",
                display_path(config.readwise.token_path.as_deref())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save(&save_path)
        .context("Failed to save configuration")?;

    let shown = if key.ends_with("password") || key == "readwise.token" {
        "********"
    } else {
        value.as_str()
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "database_path" => config.database_path = value.into(),
        "ca_cert_dir" => config.ca_cert_dir = optional(value).map(PathBuf::from),
        "template_path" => config.template_path = optional(value).map(PathBuf::from),
        "header_template_path" => config.header_template_path = optional(value).map(PathBuf::from),
        "write_backup" => {
            config.write_backup = value
                .parse()
                .context("Invalid value for write_backup. Use 'true' or 'false'.")?;
        }
        "local_dir" => config.local_dir = optional(value).map(PathBuf::from),
        "webdav.url" => config.webdav.url = value.to_string(),
        "webdav.username" => config.webdav.username = value.to_string(),
        "webdav.password" => config.webdav.password = value.to_string(),
        "webdav.base_path" => config.webdav.base_path = value.to_string(),
        "readwise.token" => config.readwise.token = optional(value).map(String::from),
        "readwise.token_path" => config.readwise.token_path = optional(value).map(PathBuf::from),
        "readwise.api_url" => config.readwise.api_url = value.to_string(),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

fn optional(value: &str) -> Option<&str> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value)
    }
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn secret(value: &str) -> &'static str {
    if value.is_empty() {
        "(not set)"
    } else {
        "********"
    }
}
