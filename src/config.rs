//! Configuration for Proto
//!
//! Handles loading `proto.config.toml`: the SQL dialect and, optionally, a
//! replacement JSON function table.

use proto_core::{Dialect, JsonFunctions, QueryContext};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE: &str = "proto.config.toml";

/// ```toml
/// dialect = "mysql"
///
/// [json]
/// array_agg = "JSON_ARRAYAGG"
/// object = "JSON_OBJECT"
/// empty_array = "JSON_ARRAY()"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub dialect: Dialect,
    /// Overrides the dialect's default JSON functions.
    #[serde(default)]
    pub json: Option<JsonFunctions>,
}

impl Config {
    /// Load from default config file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.into())
            } else {
                ConfigError::Io(path.into(), e)
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.into(), e))
    }

    /// The compilation context this configuration describes.
    pub fn context(&self) -> QueryContext {
        let ctx = QueryContext::new(self.dialect);
        match &self.json {
            Some(json) => ctx.with_json(json.clone()),
            None => ctx,
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(ConfigError::Invalid)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[source] toml::de::Error),
}
