use std::path::{Path, PathBuf};

use player_engine::{HeadlessConfig, PlaybackConfig};
use progress_sync::ProgressConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

const APP_DIR: &str = "coursecast";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite URL of the progress and view database.
    pub database_url: String,
    /// Viewer progress is stored under when none is given on the command line.
    pub viewer_id: Option<String>,
    pub colored: bool,
    pub playback: PlaybackConfig,
    pub progress: ProgressConfig,
    pub headless: HeadlessConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            viewer_id: None,
            colored: true,
            playback: PlaybackConfig::default(),
            progress: ProgressConfig::default(),
            headless: HeadlessConfig::default(),
        }
    }
}

fn default_database_url() -> String {
    match dirs::data_local_dir() {
        Some(dir) => format!(
            "sqlite://{}",
            dir.join(APP_DIR).join("progress.db").display()
        ),
        None => "sqlite://coursecast.db".to_string(),
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path()
                .ok_or_else(|| Error::config("could not determine the configuration directory")),
        }
    }

    /// Loads the configuration, falling back to defaults when the file does
    /// not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&contents)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = Self::resolve_path(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.show()?)?;
        Ok(())
    }

    pub fn reset(path: Option<&Path>) -> Result<()> {
        Self::default().save(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Filesystem path behind a `sqlite://` URL, if it points at a file.
    pub fn database_path(&self) -> Option<PathBuf> {
        let rest = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or(rest);
        if path.is_empty() || path.contains(":memory:") {
            return None;
        }
        Some(PathBuf::from(path))
    }
}
