//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/kobosync/config.toml)
//! 3. Environment variables (KOBOSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.
//! The loaded `Config` is handed to each component when it is built;
//! nothing reads configuration from global state.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "KOBOSYNC";

/// Where the e-reader keeps its database
pub const DEFAULT_DATABASE_PATH: &str = "/mnt/onboard/.kobo/KoboReader.sqlite";

/// Remote folder used when `webdav.base_path` is not set
pub const DEFAULT_BASE_PATH: &str = "/kobo-highlights";

/// Readwise highlight creation endpoint
pub const DEFAULT_READWISE_URL: &str = "https://readwise.io/api/v2/highlights/";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the e-reader SQLite database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory of PEM files trusted as root certificates
    #[serde(default)]
    pub ca_cert_dir: Option<PathBuf>,

    /// Custom body template (handlebars)
    #[serde(default)]
    pub template_path: Option<PathBuf>,

    /// Custom header template (handlebars)
    #[serde(default)]
    pub header_template_path: Option<PathBuf>,

    /// Keep a `.backup` copy of a document while it is being replaced
    #[serde(default = "default_true")]
    pub write_backup: bool,

    /// Sync into a local directory instead of a WebDAV server
    #[serde(default)]
    pub local_dir: Option<PathBuf>,

    /// WebDAV server settings
    #[serde(default)]
    pub webdav: WebDavConfig,

    /// Readwise push settings
    #[serde(default)]
    pub readwise: ReadwiseConfig,
}

/// WebDAV connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebDavConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Remote folder holding the book documents and the cursor blob
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

/// Readwise API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadwiseConfig {
    #[serde(default)]
    pub token: Option<String>,
    /// File holding the token, read when `token` is unset
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    #[serde(default = "default_readwise_url")]
    pub api_url: String,
}

impl Default for ReadwiseConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_path: None,
            api_url: default_readwise_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            ca_cert_dir: None,
            template_path: None,
            header_template_path: None,
            write_backup: true,
            local_dir: None,
            webdav: WebDavConfig {
                base_path: default_base_path(),
                ..WebDavConfig::default()
            },
            readwise: ReadwiseConfig::default(),
        }
    }
}

/// Body and header template text, `None` meaning the built-in default
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Templates {
    pub body: Option<String>,
    pub header: Option<String>,
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (KOBOSYNC_DATABASE_PATH, KOBOSYNC_WEBDAV_URL, ...)
    /// 2. Config file (~/.config/kobosync/config.toml or KOBOSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load from `--config` when given, else from the default location
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_value("DATABASE_PATH") {
            self.database_path = PathBuf::from(val);
        }
        if let Some(val) = env_value("CA_CERT_DIR") {
            self.ca_cert_dir = non_empty(val).map(PathBuf::from);
        }
        if let Some(val) = env_value("LOCAL_DIR") {
            self.local_dir = non_empty(val).map(PathBuf::from);
        }
        if let Some(val) = env_value("WEBDAV_URL") {
            self.webdav.url = val;
        }
        if let Some(val) = env_value("WEBDAV_USERNAME") {
            self.webdav.username = val;
        }
        if let Some(val) = env_value("WEBDAV_PASSWORD") {
            self.webdav.password = val;
        }
        if let Some(val) = env_value("WEBDAV_PATH") {
            self.webdav.base_path = val;
        }
        if let Some(val) = env_value("READWISE_TOKEN") {
            self.readwise.token = non_empty(val);
        }
    }

    /// Check that the WebDAV settings are usable
    ///
    /// Fills in the default base path when it was left empty.
    pub fn validate_webdav(&mut self) -> Result<()> {
        if self.webdav.url.trim().is_empty() {
            bail!("webdav.url is required");
        }
        if self.webdav.username.trim().is_empty() {
            bail!("webdav.username is required");
        }
        if self.webdav.password.is_empty() {
            bail!("webdav.password is required");
        }
        if self.webdav.base_path.trim().is_empty() {
            self.webdav.base_path = default_base_path();
        }
        Ok(())
    }

    /// Remote folder for documents and the cursor
    ///
    /// A local directory store is rooted at the folder itself, so its base is `/`.
    pub fn base_path(&self) -> &str {
        if self.local_dir.is_some() {
            "/"
        } else if self.webdav.base_path.trim().is_empty() {
            DEFAULT_BASE_PATH
        } else {
            &self.webdav.base_path
        }
    }

    /// Read the configured template files
    ///
    /// A missing file means the built-in template is used; any other read
    /// error is reported.
    pub fn load_templates(&self) -> Result<Templates> {
        Ok(Templates {
            body: read_optional(self.template_path.as_deref())?,
            header: read_optional(self.header_template_path.as_deref())?,
        })
    }

    /// Resolve the Readwise token from config, env, or the token file
    pub fn readwise_token(&self) -> Result<String> {
        if let Some(token) = self.readwise.token.as_deref() {
            let token = token.trim();
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }

        let Some(ref path) = self.readwise.token_path else {
            bail!("Readwise token not configured (set readwise.token or readwise.token_path)");
        };

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read API token from {:?}", path))?;
        let token = data.trim();
        if token.is_empty() {
            bail!("Readwise token file {:?} is empty", path);
        }
        Ok(token.to_string())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with KOBOSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_value("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kobosync")
            .join("config.toml")
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

fn non_empty(val: String) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    let Some(path) = path else {
        return Ok(None);
    };
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("template {:?} not found, using built-in", path);
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read template {:?}", path)),
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

fn default_readwise_url() -> String {
    DEFAULT_READWISE_URL.to_string()
}

fn default_true() -> bool {
    true
}
