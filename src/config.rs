//! Directory and index settings.
//!
//! Values are layered: command line flags (and their environment variables,
//! handled by the CLI) override the optional `bbin.toml` config file, which
//! overrides the built-in defaults.

use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use crate::error::{BbinError, Result};
use crate::util::expand_home;

/// Git repository holding the package index.
pub const DEFAULT_INDEX_URL: &str = "https://github.com/ThatXliner/binbin_files.git";
pub const DEFAULT_INDEX_DIR: &str = "~/.config/binbin";
pub const DEFAULT_BIN_DIR: &str = "~/bin";
pub const DEFAULT_APP_DIR: &str = "~/app";
pub const CONFIG_FILE: &str = "bbin.toml";

/// Contents of `bbin.toml`. Every key is optional.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub index_url: Option<String>,
    pub index_dir: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub app_dir: Option<PathBuf>,
}

impl ConfigFile {
    /// Loads a config file. A missing file is an empty config.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ConfigFile> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content).map_err(|e| BbinError::Config(format!("{}: {e}", path.display())))
    }
}

/// Explicit overrides, typically from flags or environment variables.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub index_url: Option<String>,
    pub index_dir: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub app_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub index_url: String,
    pub index_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub app_dir: PathBuf,
}

/// Default location of `bbin.toml` in the user's config directory.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "bbin", "bbin").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl Settings {
    /// Resolves settings from overrides, the config file and defaults.
    pub fn resolve(overrides: Overrides) -> Result<Settings> {
        let file = match overrides.config.clone().or_else(default_config_path) {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Ok(Settings::layer(overrides, file))
    }

    /// Applies `overrides` over `file` over the defaults.
    pub fn layer(overrides: Overrides, file: ConfigFile) -> Settings {
        let dir = |flag: Option<PathBuf>, file: Option<PathBuf>, default: &str| {
            expand_home(flag.or(file).unwrap_or_else(|| PathBuf::from(default)))
        };
        Settings {
            index_url: overrides
                .index_url
                .or(file.index_url)
                .unwrap_or_else(|| DEFAULT_INDEX_URL.to_string()),
            index_dir: dir(overrides.index_dir, file.index_dir, DEFAULT_INDEX_DIR),
            bin_dir: dir(overrides.bin_dir, file.bin_dir, DEFAULT_BIN_DIR),
            app_dir: dir(overrides.app_dir, file.app_dir, DEFAULT_APP_DIR),
        }
    }
}
