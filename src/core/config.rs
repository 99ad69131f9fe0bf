use crate::core::dictionary::DictionaryLayout;
use crate::error::{AedictError, Result};
use crate::utils::fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the dictionary catalog and downloadable dictionaries live.
pub const DEFAULT_DICTIONARY_BASE_URL: &str = "http://baka.sk/aedict/dicts/";
/// Overrides [`Config::base_dir`] when set.
pub const BASE_DIR_ENV: &str = "AEDICT_BASE_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of all downloaded dictionaries.
    pub base_dir: PathBuf,
    /// Base location for `dictionaries.txt` and the files it lists.
    #[serde(default = "default_dictionary_base_url")]
    pub dictionary_base_url: String,
    /// Quick-launch preference. Stored for graphical front ends; the CLI
    /// only shows and updates it.
    #[serde(default)]
    pub always_available: bool,
}

fn default_dictionary_base_url() -> String {
    DEFAULT_DICTIONARY_BASE_URL.to_string()
}

impl Config {
    pub fn new() -> Result<Self> {
        Ok(Config {
            base_dir: default_base_dir()?,
            dictionary_base_url: default_dictionary_base_url(),
            always_available: false,
        })
    }

    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&get_config_path()?)?;
        if let Some(base_dir) = std::env::var_os(BASE_DIR_ENV) {
            config.base_dir = PathBuf::from(base_dir);
        }
        Ok(config)
    }

    /// Loads the configuration at `path`, writing defaults there if absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::new()?;
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::ensure_dir_exists(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn set_always_available(&mut self, enabled: bool) -> Result<()> {
        self.always_available = enabled;
        self.save()
    }

    pub fn layout(&self) -> DictionaryLayout {
        DictionaryLayout::new(&self.base_dir)
    }

    fn validate(&self) -> Result<()> {
        if !self.dictionary_base_url.ends_with('/') {
            return Err(AedictError::config_error(format!(
                "dictionary_base_url must end with '/': {}",
                self.dictionary_base_url
            )));
        }
        Ok(())
    }
}

fn default_base_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("aedict"))
        .ok_or(AedictError::HomeDirectoryNotFound)
}

fn get_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("aedict").join("config.json"))
        .ok_or(AedictError::HomeDirectoryNotFound)
}
