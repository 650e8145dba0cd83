// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Driver configuration loaded from TOML.
// Author: Lukas Bower

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::parser::{RecordParser, DEFAULT_RECORD_MAGIC};

/// Environment variable naming the active configuration file.
pub const CONFIG_ENV: &str = "EFIVAR_RESTORE_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("record magic must not be empty")]
    EmptyMagic,
}

/// ```toml
/// enabled = true
/// magic = "u-root-efivar-v1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestoreConfig {
    /// When false the driver caches nothing and the restore is a no-op.
    pub enabled: bool,
    /// Tag expected in the `magic` property of record nodes.
    pub magic: String,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            magic: DEFAULT_RECORD_MAGIC.into(),
        }
    }
}

impl RestoreConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        if config.magic.is_empty() {
            return Err(ConfigError::EmptyMagic);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Configuration named by `EFIVAR_RESTORE_CONFIG`, or the defaults.
    pub fn load_active() -> Self {
        Self::load_or_default(std::env::var_os(CONFIG_ENV).map(PathBuf::from).as_deref())
    }

    fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("using default restore config: {err}");
                Self::default()
            }
        }
    }

    /// Record parser for the configured tag.
    #[must_use]
    pub fn parser(&self) -> RecordParser {
        RecordParser::new(&self.magic)
    }
}
