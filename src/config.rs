//! Configuration loading and defaults for sleepchecker-idled.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::source::{SOURCE_NAMES, WaylandIdleSource};

/// Bus the `screenDimmed` signal is emitted on.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// User session bus (default).
    #[default]
    Session,
    System,
}

/// Main configuration for sleepchecker-idled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bus used for the outbound signal (default: session).
    pub bus: BusKind,

    /// Inactivity timeout for the Wayland idle source in seconds.
    ///
    /// The source stays off unless this is set.
    pub idle_timeout_seconds: Option<u64>,

    /// Sources that are never probed, by name (e.g. "hyprland").
    pub disabled_sources: Vec<String>,

    /// Dry run mode: log notifications instead of emitting them.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusKind::default(),
            idle_timeout_seconds: None,
            disabled_sources: Vec::new(),
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.warn_unknown_sources();
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("sleepchecker-idled").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// Check if a source may be probed.
    pub fn is_source_enabled(&self, name: &str) -> bool {
        if name == WaylandIdleSource::NAME && self.idle_timeout_seconds.is_none() {
            return false;
        }
        !self.disabled_sources.iter().any(|d| d == name)
    }

    fn warn_unknown_sources(&self) {
        for name in &self.disabled_sources {
            if !SOURCE_NAMES.contains(&name.as_str()) {
                warn!(
                    "Unknown source '{}' in disabled_sources (known: {})",
                    name,
                    SOURCE_NAMES.join(", ")
                );
            }
        }
    }
}
