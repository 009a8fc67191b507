use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;

use crate::status::Palette;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Well-known bus name of the Bluetooth service
    pub service: String,
    /// Object path exporting org.freedesktop.DBus.ObjectManager
    pub path: String,
    /// Upper bound for a single bus call; unbounded when unset
    pub call_timeout_secs: Option<u64>,
    pub palette: Palette,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            service: "org.bluez".to_string(),
            path: "/".to_string(),
            call_timeout_secs: None,
            palette: Palette::default(),
        }
    }
}

impl DaemonConfig {
    /// Read the config file, falling back to defaults when it does not exist.
    pub fn load(path: &str) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("invalid configuration in {}", path)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No configuration at {}, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path)),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}
