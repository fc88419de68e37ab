// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Configuration consumed as plain data.
//!
//! The engine itself takes no configuration beyond the executor pool
//! size; this carries default whitelist paths for the front end and the
//! [`BagManager`](crate::manager::BagManager).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{BagError, Result};

/// Tool configuration, loaded from a TOML file.
///
/// ```toml
/// [whitelists]
/// sensors = "/etc/bagsift/sensors.txt"
/// nav = "/etc/bagsift/nav.txt"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Named default whitelist files
    #[serde(default)]
    pub whitelists: BTreeMap<String, PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| BagError::open(&path_str, format!("{e}")))?;
        Self::from_toml(&text)
            .map_err(|e| BagError::Other(format!("invalid config '{path_str}': {e}")))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BagError::Other(format!("invalid config: {e}")))
    }

    /// Look up a named whitelist path.
    pub fn whitelist(&self, name: &str) -> Option<&PathBuf> {
        self.whitelists.get(name)
    }
}
