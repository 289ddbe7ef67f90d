// Copyright 2025 Fernando Borretti
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

use std::fs::read_to_string;
use std::fs::write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::error::fail;
use crate::queue::DEFAULT_MAX_NEW_CARDS_PER_DAY;

pub const DEFAULT_SETTINGS_PATH: &str = "cardqueue.toml";

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Path to the SQLite database holding cards and queue state.
    pub database: PathBuf,
    /// Daily new card limit used until one is set explicitly.
    pub default_max_new_cards_per_day: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("cardqueue.db"),
            default_max_new_cards_per_day: DEFAULT_MAX_NEW_CARDS_PER_DAY,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Fallible<Self> {
        if !path.exists() {
            log::debug!("No settings file at {path:?}, using defaults.");
            return Ok(Self::default());
        }
        let content = read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        if settings.default_max_new_cards_per_day == 0 {
            return fail("default_max_new_cards_per_day must be at least 1.");
        }
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Fallible<()> {
        let content = toml::to_string_pretty(self)?;
        write(path, content)?;
        Ok(())
    }
}
