use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Default config shipped with the package, installed by `config publish`.
pub const BUNDLED_CONFIG: &str = include_str!("../config/openai.toml");
pub const BUNDLED_CONFIG_NAME: &str = "config/openai.toml";
pub const CONFIG_FILE_NAME: &str = "openai.toml";
const APP_DIR: &str = "aiagents";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot resolve config path: set AIAGENTS_CONFIG or HOME/XDG_CONFIG_HOME.")]
    UnresolvedPath,

    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Profile '{name}' not found in config file '{}'.", path.display())]
    ProfileNotFound { name: String, path: PathBuf },

    #[error("Invalid {origin} output '{value}'. Supported values: text, json.")]
    InvalidOutput { origin: String, value: String },
}

/// Rendering mode for chat replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(value.to_string()),
        }
    }
}

/// One layer of chat settings; `[openai]` and every profile share this shape.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatConfig {
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u64>,
    pub output: Option<String>,
}

impl ChatConfig {
    /// Returns `self` with every field set in `top` replaced.
    pub fn overlay(self, top: &ChatConfig) -> ChatConfig {
        ChatConfig {
            base_url: top.base_url.clone().or(self.base_url),
            api_key_env: top.api_key_env.clone().or(self.api_key_env),
            model: top.model.clone().or(self.model),
            system: top.system.clone().or(self.system),
            temperature: top.temperature.or(self.temperature),
            max_tokens: top.max_tokens.or(self.max_tokens),
            timeout: top.timeout.or(self.timeout),
            retries: top.retries.or(self.retries),
            retry_delay: top.retry_delay.or(self.retry_delay),
            output: top.output.clone().or(self.output),
        }
    }

    fn output_mode(&self, origin: &str) -> Result<Option<OutputMode>, ConfigError> {
        self.output
            .as_deref()
            .map(|value| {
                value.parse::<OutputMode>().map_err(|value| ConfigError::InvalidOutput {
                    origin: origin.to_string(),
                    value,
                })
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub openai: ChatConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ChatConfig>,
}

impl ConfigFile {
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Merges `[openai]` with the named profile, if any.
    pub fn resolve(&self, profile: Option<&str>, path: &Path) -> Result<ChatConfig, ConfigError> {
        let base = self.openai.clone();
        let Some(name) = profile else {
            return Ok(base);
        };
        let layer = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.to_string(),
                path: path.to_path_buf(),
            })?;
        Ok(base.overlay(layer))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.openai.output_mode("[openai]")?;
        let mut names = self.profiles.keys().collect::<Vec<_>>();
        names.sort();
        for name in names {
            self.profiles[name].output_mode(&format!("profile '{name}'"))?;
        }
        Ok(())
    }
}

/// Loads the effective config layer for a chat run.
///
/// A missing file is only an error when a profile was requested.
pub fn load(profile: Option<&str>) -> Result<ChatConfig, ConfigError> {
    let path = match (config_path(), profile) {
        (Ok(path), _) => path,
        (Err(_), None) => return Ok(ChatConfig::default()),
        (Err(err), Some(_)) => return Err(err),
    };

    if profile.is_none() && !path.exists() {
        return Ok(ChatConfig::default());
    }

    ConfigFile::read(&path)?.resolve(profile, &path)
}

/// Parses the config file and checks every output value and the optional
/// profile. Returns the checked path.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    let file = ConfigFile::read(&path)?;
    file.validate()?;
    file.resolve(profile, &path)?;
    Ok(path)
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = non_empty_env("AIAGENTS_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    if let Some(xdg) = non_empty_env("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE_NAME));
    }

    let home = non_empty_env("HOME").ok_or(ConfigError::UnresolvedPath)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join(APP_DIR)
        .join(CONFIG_FILE_NAME))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
