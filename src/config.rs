//! Typed key/value configuration.
//!
//! A [`Configuration`] is an explicit value passed to constructors.
//! The typed configs ([`RegistryConfig`], [`SceneConfig`], [`PoolConfig`])
//! read their fields from well-known keys and fall back to their defaults.

use std::collections::BTreeMap;
use std::path::Path;
use std::{fmt, fs, io};

use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Errors from loading or saving a [`Configuration`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("cannot access configuration file: {0}")]
    Io(#[from] io::Error),
    /// The file is not a valid configuration table.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The configuration cannot be represented as TOML.
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// Types that can be stored in a [`Configuration`].
pub trait ConfigValue: Sized {
    /// Extracts the value, returning `None` if the variant does not match.
    fn from_value(value: &Value) -> Option<Self>;

    /// Wraps the value.
    fn into_value(self) -> Value;
}

impl ConfigValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::Bool(value) => Some(value),
            _ => None,
        }
    }

    fn into_value(self) -> Value { Value::Bool(self) }
}

impl ConfigValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::Int(value) => Some(value),
            _ => None,
        }
    }

    fn into_value(self) -> Value { Value::Int(self) }
}

impl ConfigValue for usize {
    fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::Int(value) => usize::try_from(value).ok(),
            _ => None,
        }
    }

    fn into_value(self) -> Value { Value::Int(i64::try_from(self).unwrap_or(i64::MAX)) }
}

impl ConfigValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::Float(value) => Some(value),
            Value::Int(value) => Some(value as f64),
            _ => None,
        }
    }

    fn into_value(self) -> Value { Value::Float(self) }
}

impl ConfigValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn into_value(self) -> Value { Value::Str(self) }
}

/// A flat table of configuration values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: BTreeMap<String, Value>,
}

impl Configuration {
    /// Creates an empty configuration.
    pub fn new() -> Self { Self::default() }

    /// Gets a value, or `default` if the key is missing or has another type.
    pub fn get_or<T: ConfigValue>(&self, key: &str, default: T) -> T {
        match self.values.get(key) {
            Some(value) => match T::from_value(value) {
                Some(value) => value,
                None => {
                    log::warn!(
                        "Configuration key {key} has unexpected value {value}, using the default"
                    );
                    default
                }
            },
            None => {
                log::warn!("Configuration key {key} is missing, using the default");
                default
            }
        }
    }

    /// Gets a value if it is present with the expected type.
    pub fn get<T: ConfigValue>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(T::from_value)
    }

    /// Sets a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl ConfigValue) -> Option<Value> {
        self.values.insert(key.into(), value.into_value())
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> { self.values.remove(key) }

    /// Checks whether a key is present.
    pub fn contains(&self, key: &str) -> bool { self.values.contains_key(key) }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> { Ok(toml::from_str(text)?) }

    /// Formats the configuration as TOML text.
    pub fn to_toml(&self) -> Result<String, ConfigError> { Ok(toml::to_string(self)?) }

    /// Loads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Saves the configuration to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

/// Parameters of a [`Registry`](crate::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// The maximum number of live entities.
    pub max_entities:       usize,
    /// Initial capacity reserved for the result list of each view.
    pub view_capacity_hint: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self { Self { max_entities: 65536, view_capacity_hint: 256 } }
}

impl RegistryConfig {
    /// Reads `registry.max_entities` and `registry.view_capacity_hint`.
    pub fn from_config(config: &Configuration) -> Self {
        let default = Self::default();
        Self {
            max_entities:       config.get_or("registry.max_entities", default.max_entities),
            view_capacity_hint: config
                .get_or("registry.view_capacity_hint", default.view_capacity_hint),
        }
    }
}

/// Parameters of a [`Scene`](crate::render::Scene).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneConfig {
    /// Number of object slots reserved for static objects.
    pub max_static_objects:  usize,
    /// Number of object slots reserved for dynamic objects.
    pub max_dynamic_objects: usize,
}

impl Default for SceneConfig {
    fn default() -> Self { Self { max_static_objects: 4096, max_dynamic_objects: 1024 } }
}

impl SceneConfig {
    /// Reads `scene.max_static_objects` and `scene.max_dynamic_objects`.
    pub fn from_config(config: &Configuration) -> Self {
        let default = Self::default();
        Self {
            max_static_objects:  config
                .get_or("scene.max_static_objects", default.max_static_objects),
            max_dynamic_objects: config
                .get_or("scene.max_dynamic_objects", default.max_dynamic_objects),
        }
    }
}

/// Parameters of a [`ThreadPool`](crate::ThreadPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map_or(1, |count| count.get());
        Self { workers }
    }
}

impl PoolConfig {
    /// Reads `thread_pool.workers`.
    ///
    /// A worker count of zero is raised to one.
    pub fn from_config(config: &Configuration) -> Self {
        let workers = config.get_or("thread_pool.workers", Self::default().workers);
        Self { workers: workers.max(1) }
    }
}
