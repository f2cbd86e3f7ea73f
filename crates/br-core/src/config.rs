use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BridgeError;
use crate::time::{TickRate, USER_HZ};

/// Default location of the optional settings file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/brctl/brctl.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

/// Registry limits and presentation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Upper bound on bridges fetched in one enumeration.
    pub max_bridges: usize,
    /// Port slots fetched per bridge (the STP port number space).
    pub max_ports: usize,
    /// FDB records requested per page.
    pub fdb_page_size: usize,
    /// Ticks per second of kernel bridge timers.
    pub tick_rate: u32,
    pub output: OutputFormat,
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        let positive = [
            ("max_bridges", self.max_bridges),
            ("max_ports", self.max_ports),
            ("fdb_page_size", self.fdb_page_size),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(BridgeError::Config {
                    field,
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        if self.max_ports > usize::from(u16::MAX) + 1 {
            return Err(BridgeError::Config {
                field: "max_ports",
                message: format!("at most {} slots are addressable", usize::from(u16::MAX) + 1),
            });
        }
        TickRate::new(self.tick_rate)?;
        Ok(())
    }

    pub fn tick_rate(&self) -> Result<TickRate, BridgeError> {
        TickRate::new(self.tick_rate)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_bridges: 1024,
            max_ports: 256,
            fdb_page_size: 1024,
            tick_rate: USER_HZ,
            output: OutputFormat::Text,
        }
    }
}
