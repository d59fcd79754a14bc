use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Store key the whole queue blob lives under
pub const DEFAULT_STORE_KEY: &str = "universal_queue_state";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sync: SyncOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON file in the data directory, survives restarts
    File,
    /// Process-local map, gone when the process exits
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_store_key")]
    pub key: String,
    /// How long to wait for another process to release the store file; 0
    /// refuses immediately
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncOptions {
    /// How long a fresh consumer waits for a state reply before falling back
    #[serde(default = "default_request_state_timeout_ms")]
    pub request_state_timeout_ms: u64,
    /// Upper bound on a single listener delivery
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Capacity of the owner command channel and listener inboxes
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// URL fragments that mark a specific playback URL
    #[serde(default = "default_watch_markers")]
    pub watch_markers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json_logging")]
    pub json: bool,
    pub file: Option<PathBuf>,
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::File
}

fn default_store_key() -> String {
    DEFAULT_STORE_KEY.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_request_state_timeout_ms() -> u64 {
    2000
}

fn default_delivery_timeout_ms() -> u64 {
    500
}

fn default_channel_capacity() -> usize {
    64
}

pub fn default_watch_markers() -> Vec<String> {
    vec!["/watch".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json_logging() -> bool {
    use std::io::IsTerminal;
    !std::io::stdout().is_terminal()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            key: default_store_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            request_state_timeout_ms: default_request_state_timeout_ms(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            watch_markers: default_watch_markers(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json_logging(),
            file: None,
        }
    }
}

impl StoreConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl SyncOptions {
    pub fn request_state_timeout(&self) -> Duration {
        Duration::from_millis(self.request_state_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if present, defaults otherwise
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store.key.trim().is_empty() {
            return Err(anyhow::anyhow!("store.key cannot be empty"));
        }
        if self.sync.request_state_timeout_ms == 0 {
            return Err(anyhow::anyhow!("sync.request_state_timeout_ms must be greater than zero"));
        }
        if self.sync.delivery_timeout_ms == 0 {
            return Err(anyhow::anyhow!("sync.delivery_timeout_ms must be greater than zero"));
        }
        if self.sync.channel_capacity == 0 {
            return Err(anyhow::anyhow!("sync.channel_capacity must be greater than zero"));
        }
        if self.sync.watch_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(anyhow::anyhow!("sync.watch_markers needs at least one non-empty marker"));
        }
        Ok(())
    }
}
