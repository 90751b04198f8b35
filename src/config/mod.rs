// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving link settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the directory under the platform config dir.
const APP_DIR: &str = "roadsense-link";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Link and transport settings.
    pub link: LinkConfig,

    /// Watchdog timing.
    pub liveness: LivenessConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Name fragments identifying the logger among paired devices.
    pub device_markers: Vec<String>,

    /// RFCOMM channel the logger listens on.
    pub rfcomm_channel: u8,

    /// Upper bound on stream establishment in milliseconds.
    pub connect_timeout_ms: u64,

    /// Pause after each outbound command in milliseconds.
    pub command_spacing_ms: u64,

    /// Longest accepted inbound line.
    pub max_line_bytes: usize,

    /// Size of a single stream read.
    pub read_buffer_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub check_interval_ms: u64,
    pub probe_after_ms: u64,
    pub probe_grace_ms: u64,
    pub timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_markers: vec![
                "RoadsenseLogger-v2.4".to_string(),
                "RoadsenseLogger".to_string(),
                "Roadsense".to_string(),
            ],
            rfcomm_channel: 1,
            connect_timeout_ms: 8000,
            command_spacing_ms: 100,
            max_line_bytes: 4096,
            read_buffer_bytes: 1024,
        }
    }
}

impl LinkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_spacing(&self) -> Duration {
        Duration::from_millis(self.command_spacing_ms)
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 5000,
            probe_after_ms: 10_000,
            probe_grace_ms: 2000,
            timeout_ms: 15_000,
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Invalid config in {}", path.display()))
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
