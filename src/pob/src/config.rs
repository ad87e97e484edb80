//! Filesystem locations used by the data store and the engine adapter.

use std::path::{Path, PathBuf};

/// Rune table source, relative to the install root.
pub const MOD_RUNES_FILE: &str = "Data/ModRunes.lua";

/// Trade mod source, relative to the install root.
pub const QUERY_MODS_FILE: &str = "Data/QueryMods.lua";

/// Bridge script the headless engine runs, relative to the install root.
pub const BRIDGE_SCRIPT_FILE: &str = "HeadlessBridge.lua";

pub const DEFAULT_LAUNCHER: &str = "luajit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PobPaths {
    /// Path of Building install root
    pub install: PathBuf,
    /// Working-data root (user settings, builds)
    pub data: PathBuf,
    /// Build loaded when a load request names none
    pub default_build: Option<PathBuf>,
    pub runes_file: PathBuf,
    pub enchants_file: PathBuf,
    pub launcher: String,
    pub bridge_script: PathBuf,
}

impl PobPaths {
    /// Derive every location from the install root.
    pub fn from_install(install: impl AsRef<Path>) -> Self {
        let install = install.as_ref().to_path_buf();
        PobPaths {
            data: install.clone(),
            default_build: None,
            runes_file: install.join(MOD_RUNES_FILE),
            enchants_file: install.join(QUERY_MODS_FILE),
            launcher: DEFAULT_LAUNCHER.to_string(),
            bridge_script: install.join(BRIDGE_SCRIPT_FILE),
            install,
        }
    }

    pub fn with_data(mut self, data: impl Into<PathBuf>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_default_build(mut self, build: impl Into<PathBuf>) -> Self {
        self.default_build = Some(build.into());
        self
    }
}
