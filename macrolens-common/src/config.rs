//! Configuration loading and data folder resolution
//!
//! Settings come from an optional TOML file; every field has a built-in
//! default so a missing or partial file never prevents startup.

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV_VAR: &str = "MACROLENS_DATA_FOLDER";

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "macrolens.db";

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:5730/api/analyze";
pub const DEFAULT_MODEL: &str = "claude-opus-4-5-20251101";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5730";

/// How the scanner reaches the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Call the inference endpoint with the user's own API key
    #[default]
    Direct,
    /// Call a relay that holds the API key server-side
    Relay,
}

/// Configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the local database
    pub data_folder: Option<PathBuf>,

    /// Deployment shape used by the scanner
    pub mode: InferenceMode,

    /// Relay endpoint (relay mode)
    pub relay_url: String,

    /// Inference endpoint (direct mode, and the relay's upstream)
    pub api_url: String,

    pub model: String,

    /// Maximum output tokens requested from the model
    pub max_tokens: u32,

    /// Number of past scans kept
    pub history_capacity: usize,

    /// Transport timeout for one inference call
    pub request_timeout_secs: u64,

    /// Relay listen address
    pub bind_address: String,

    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            mode: InferenceMode::default(),
            relay_url: DEFAULT_RELAY_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            request_timeout_secs: 60,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the scanner misbehave
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(Error::Config(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from an explicit path, or the platform config file if `None`
    ///
    /// A missing default file yields defaults with a warning. An explicit path
    /// that cannot be read is an error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => match find_config_file() {
                Some(path) => path,
                None => {
                    warn!("No config file found, using built-in defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config: {}", path.display());
        Ok(config)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Locate the platform configuration file, if one exists
///
/// Linux tries `~/.config/macrolens/config.toml` then
/// `/etc/macrolens/config.toml`; other platforms use the user config dir only.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("macrolens").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/macrolens/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Data folder resolution, priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("macrolens"))
        .unwrap_or_else(|| PathBuf::from("./macrolens_data"))
}

/// Creates the data folder and locates files inside it
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.data_folder.exists() {
            std::fs::create_dir_all(&self.data_folder)?;
            info!("Created data folder: {}", self.data_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE_NAME)
    }
}
