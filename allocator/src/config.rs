//! # Allocation Configuration & Constants
//!
//! Every name the allocator shares with the host (setting keys, record type
//! tags, crew positions) lives here, next to the [`ConfigSource`] seam that
//! supplies the process-wide default cap on active Energy Points.
//!
//! Configuration is always injected. Nothing in this crate reads a global
//! settings registry: callers hand a [`ConfigSource`] to the allocator and
//! the allocator asks it when a ship carries no override of its own.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Setting Keys
// ---------------------------------------------------------------------------

/// Namespace under which ship settings are registered.
pub const SETTINGS_NAMESPACE: &str = "starship";

/// Setting holding the default maximum number of active EP tokens per ship.
pub const DEFAULT_MAX_EP_SETTING: &str = "defaultMaxEnergyPoints";

/// Used when the configured default is missing or unusable.
pub const FALLBACK_MAX_ENERGY_POINTS: u32 = 6;

// ---------------------------------------------------------------------------
// Record Layout
// ---------------------------------------------------------------------------

/// Embedded record type tag for Energy Point tokens.
pub const EP_TOKEN_RECORD_TYPE: &str = "epToken";

/// Display name given to freshly minted tokens.
pub const EP_TOKEN_RECORD_NAME: &str = "Energy Point";

/// Crew position whose owners may redistribute a ship's Energy Points.
pub const ENGINEER_POSITION: &str = "engineer";

// ---------------------------------------------------------------------------
// ConfigSource
// ---------------------------------------------------------------------------

/// Read-only global configuration lookup.
pub trait ConfigSource: Send + Sync {
    /// Returns the value registered under `namespace.key`, if any.
    fn get_setting(&self, namespace: &str, key: &str) -> Option<Value>;
}

/// Errors raised while loading a settings file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("settings namespace '{0}' must be a JSON object")]
    NotAnObject(String),
}

/// An immutable, in-process settings table: `namespace -> key -> value`.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    settings: HashMap<String, HashMap<String, Value>>,
}

impl StaticConfig {
    /// Creates an empty settings table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of a single setting.
    pub fn with_setting(
        mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: Value,
    ) -> Self {
        self.settings
            .entry(namespace.into())
            .or_default()
            .insert(key.into(), value);
        self
    }

    /// Parses a settings document of the form
    /// `{ "<namespace>": { "<key>": <value>, ... }, ... }`.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let root: HashMap<String, Value> = serde_json::from_str(document)?;
        let mut config = Self::new();
        for (namespace, entries) in root {
            let Value::Object(entries) = entries else {
                return Err(ConfigError::NotAnObject(namespace));
            };
            let table = config.settings.entry(namespace).or_default();
            table.extend(entries);
        }
        Ok(config)
    }

    /// Reads and parses a JSON settings file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path)?;
        Self::from_json_str(&document)
    }
}

impl ConfigSource for StaticConfig {
    fn get_setting(&self, namespace: &str, key: &str) -> Option<Value> {
        self.settings
            .get(namespace)
            .and_then(|table| table.get(key))
            .cloned()
    }
}

/// Interprets a setting value as a positive token count.
///
/// Accepts JSON integers and numeric strings; zero, negatives, fractions
/// and everything else yield `None`.
pub fn positive_count(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|n| *n > 0)
}
