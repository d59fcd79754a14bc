use anyhow::Result;
use std::path::{Path, PathBuf};

/// Base path override, e.g. for containers or tests
pub fn override_base_path() -> Option<PathBuf> {
    std::env::var("WATCHQUEUE_BASE_PATH").ok().map(PathBuf::from)
}

pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("watchqueue");

        Ok(Self::from_base(base_dir))
    }

    /// Config files at the base level, data and logs in subdirectories
    pub fn from_base(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            config_dir: base.clone(),
            data_dir: base.join("data"),
            log_dir: base.join("logs"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// File the file store keeps the queue blob in
    pub fn store_file(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("watchqueue.log")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        if let Some(base) = override_base_path() {
            return Self::from_base(base);
        }

        // Platform-specific paths (e.g., ~/.config/watchqueue on Linux)
        Self::new().unwrap_or_else(|_| Self::from_base(std::env::temp_dir().join("watchqueue")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_base() {
        let paths = PathManager::from_base("/srv/wq");
        assert_eq!(paths.config_file(), PathBuf::from("/srv/wq/config.toml"));
        assert_eq!(
            paths.store_file("universal_queue_state"),
            PathBuf::from("/srv/wq/data/universal_queue_state.json")
        );
        assert_eq!(paths.log_file(), PathBuf::from("/srv/wq/logs/watchqueue.log"));
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::from_base(dir.path().join("base"));
        paths.ensure_directories().unwrap();
        assert!(paths.data_dir().is_dir());
        assert!(paths.log_dir().is_dir());
    }
}
