pub mod config;
pub mod paths;

pub use config::{default_watch_markers, Config, LoggingConfig, StoreBackend, StoreConfig, SyncOptions, DEFAULT_STORE_KEY};
pub use paths::{override_base_path, PathManager};
