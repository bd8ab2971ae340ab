//! Where the tracker keeps its data, layered from defaults, config files
//! and `DESCANSA_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the sleep data file.
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            data_path: data_dir.join("descansa.dat"),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // DESCANSA_DATA_PATH and friends
        figment = figment.merge(Env::prefixed("DESCANSA_"));

        figment.extract()
    }

    /// The data file as an absolute path, resolved against the working directory.
    ///
    /// Rejects paths that name a directory, since the tracker replaces the
    /// file atomically and needs a file name to write next to.
    pub fn data_file(&self) -> Result<PathBuf> {
        if self.data_path.as_os_str().is_empty() {
            bail!("data_path is empty");
        }
        let path = std::path::absolute(&self.data_path)
            .with_context(|| format!("invalid data path {}", self.data_path.display()))?;
        if path.is_dir() || path.file_name().is_none() {
            bail!("data_path {} is a directory, expected a file", path.display());
        }
        Ok(path)
    }
}

/// Returns the platform-specific config directory for descansa.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("descansa"))
}

/// Returns the platform-specific data directory for descansa.
///
/// On Linux: `~/.local/share/descansa`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("descansa"))
}
