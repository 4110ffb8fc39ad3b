//! Injector configuration.
//!
//! Settings can be built in code, read from environment variables
//! (`FERROUS_INJECT_NAME`, `FERROUS_INJECT_MAX_DEPTH`,
//! `FERROUS_INJECT_IMPLICIT_CLASSES`, `FERROUS_INJECT_CATCH_PANICS`) or, with
//! the `config` feature, deserialized from JSON.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "FERROUS_INJECT";

const DEFAULT_MAX_DEPTH: usize = 1024;

/// Behavioural settings of one injector.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct InjectorConfig {
    /// Name used in error messages and log fields
    pub name: String,
    /// Deepest dependency chain resolved before failing with `DepthExceeded`
    pub max_depth: usize,
    /// Whether an unbound class key is constructed from its own declaration
    pub implicit_classes: bool,
    /// Whether a panicking constructor or factory (sync or async) becomes an `Instantiation` error
    pub catch_panics: bool,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            name: "root".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            implicit_classes: true,
            catch_panics: true,
        }
    }
}

impl InjectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_implicit_classes(mut self, enabled: bool) -> Self {
        self.implicit_classes = enabled;
        self
    }

    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Reads overrides from `FERROUS_INJECT_*` environment variables.
    pub fn from_env() -> DiResult<Self> {
        Self::from_source(&EnvironmentConfigSource::with_prefix(ENV_PREFIX))
    }

    /// Applies overrides from any source on top of the defaults.
    pub fn from_source(source: &dyn ConfigSource) -> DiResult<Self> {
        let mut config = Self::default();
        if let Some(name) = source.get("name") {
            config.name = name;
        }
        if let Some(depth) = parse_setting::<usize>(source, "max_depth")? {
            if depth == 0 {
                return Err(DiError::InvalidSetting {
                    setting: "max_depth".to_string(),
                    reason: "must be greater than 0".to_string(),
                });
            }
            config.max_depth = depth;
        }
        if let Some(implicit) = parse_setting::<bool>(source, "implicit_classes")? {
            config.implicit_classes = implicit;
        }
        if let Some(catch) = parse_setting::<bool>(source, "catch_panics")? {
            config.catch_panics = catch;
        }
        Ok(config)
    }

    /// Parses a JSON document; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::InvalidSetting {
            setting: "json".to_string(),
            reason: e.to_string(),
        })
    }
}

fn parse_setting<T>(source: &dyn ConfigSource, setting: &str) -> DiResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source.get(setting) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|e| DiError::InvalidSetting {
                setting: setting.to_string(),
                reason: format!("{:?}: {}", raw, e),
            }),
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Get a raw setting by its lower-case name
    fn get(&self, key: &str) -> Option<String>;
}

/// Environment variable configuration source
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    /// Prefix to filter environment variables
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn variable(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(self.variable(key)).ok()
    }
}

/// In-memory source, mostly for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, String>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
