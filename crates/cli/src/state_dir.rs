//! Platform-specific state directory management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// File holding credentials and the persisted log tail
const STORAGE_FILE: &str = "storage.json";

/// Optional client configuration file
const CONFIG_FILE: &str = "treasury.toml";

/// Where the CLI keeps its files
pub struct StateDir {
    /// Project directories from the directories crate
    project_dirs: Option<ProjectDirs>,
    /// Override directory for testing or custom installations
    override_dir: Option<PathBuf>,
}

impl StateDir {
    pub fn new() -> Self {
        let project_dirs = ProjectDirs::from("io", "Constant Treasury", "treasury");
        if project_dirs.is_none() {
            warn!("Failed to determine platform-specific directories, will use fallback");
        }
        Self {
            project_dirs,
            override_dir: None,
        }
    }

    /// Keep everything under `path`
    pub fn with_override(path: impl Into<PathBuf>) -> Self {
        Self {
            project_dirs: None,
            override_dir: Some(path.into()),
        }
    }

    /// Resolve from an optional `--state-dir` flag
    pub fn from_flag(path: Option<PathBuf>) -> Self {
        path.map_or_else(Self::new, Self::with_override)
    }

    pub fn config_dir(&self) -> PathBuf {
        if let Some(override_dir) = &self.override_dir {
            return override_dir.clone();
        }

        self.project_dirs.as_ref().map_or_else(
            || PathBuf::from("./.treasury"),
            |dirs| dirs.config_dir().to_path_buf(),
        )
    }

    pub fn data_dir(&self) -> PathBuf {
        if let Some(override_dir) = &self.override_dir {
            return override_dir.clone();
        }

        self.project_dirs.as_ref().map_or_else(
            || PathBuf::from("./.treasury"),
            |dirs| dirs.data_dir().to_path_buf(),
        )
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir().join(STORAGE_FILE)
    }

    /// Configuration file, if one has been written
    pub fn config_file(&self) -> Option<PathBuf> {
        let path = self.config_dir().join(CONFIG_FILE);
        path.exists().then_some(path)
    }

    /// Create the data directory if needed
    pub fn ensure_data_dir(&self) -> Result<PathBuf> {
        let dir = self.data_dir();
        if !dir.exists() {
            debug!("Creating state directory: {}", dir.display());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
        }
        Ok(dir)
    }
}

impl Default for StateDir {
    fn default() -> Self {
        Self::new()
    }
}
