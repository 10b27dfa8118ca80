use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::Deserialize;
use thiserror::Error;

pub static DIRS: Lazy<Option<ProjectDirs>> = Lazy::new(|| ProjectDirs::from("", "", "folderizer"));

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub curse_forge_api_key: Option<String>,
    pub user_agent: String,
    pub search: SearchConfig,
    pub download: DownloadConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            curse_forge_api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            search: SearchConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Providers in the order they are tried.
    pub providers: Vec<ProviderKind>,
    pub timeout_secs: u64,
    /// Maximum number of entries searched at once.
    pub concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderKind::CurseForge,
                ProviderKind::DuckDuckGo,
                ProviderKind::Bing,
            ],
            timeout_secs: 20,
            concurrency: 5,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    CurseForge,
    DuckDuckGo,
    Bing,
}

#[derive(Debug, Error)]
pub enum GlobalConfigError {
    #[error("I/O Error on {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("TOML Parse Error in {0}: {1}")]
    TomlParse(String, #[source] toml_edit::de::Error),
}

impl GlobalConfig {
    pub fn default_path() -> Option<PathBuf> {
        DIRS.as_ref().map(|d| d.config_dir().join("config.toml"))
    }

    /// Loads `path`, or the per-user config file if `path` is `None`.
    ///
    /// A missing per-user file yields the defaults; an explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, GlobalConfigError> {
        let (config_file, must_exist) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => {
                    log::debug!("No config directory available, using default config");
                    return Ok(Self::default());
                }
            },
        };
        let config_text = match std::fs::read_to_string(&config_file) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !must_exist => {
                log::debug!(
                    "{} does not exist, using default config",
                    config_file.display()
                );
                return Ok(Self::default());
            }
            Err(e) => return Err(GlobalConfigError::Io(config_file.display().to_string(), e)),
        };
        Self::parse(&config_text)
            .map_err(|e| GlobalConfigError::TomlParse(config_file.display().to_string(), e))
    }

    pub fn parse(text: &str) -> Result<Self, toml_edit::de::Error> {
        toml_edit::de::from_str(text)
    }
}
