//! Persistent application settings (`settings.json` in the config dir).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::output::WireFormat;
use crate::project::{read_json, write_json, ProjectError};

// ── Script output settings ──────────────────────────────────────

/// How scripted invocations serialize their output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSettings {
    #[serde(default)]
    pub wire_format: WireFormat,
    /// Suppress `progress:` lines in structured output.
    #[serde(default)]
    pub quiet_progress: bool,
    /// Treat structured output protocol violations as fatal. `None` follows the
    /// build profile (fatal in debug builds only).
    #[serde(default)]
    pub strict_protocol: Option<bool>,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            wire_format: WireFormat::Lines,
            quiet_progress: false,
            strict_protocol: None,
        }
    }
}

impl ScriptSettings {
    pub fn strict(&self) -> bool {
        self.strict_protocol.unwrap_or(cfg!(debug_assertions))
    }
}

// ── App settings ─────────────────────────────────────────────────

/// Application-level settings stored in the OS config directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub version: u32,
    #[serde(default)]
    pub script: ScriptSettings,
    /// Project file opened by the previous session.
    #[serde(default)]
    pub recent_project: Option<PathBuf>,
}

const SETTINGS_VERSION: u32 = 1;

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            script: ScriptSettings::default(),
            recent_project: None,
        }
    }
}

/// Load settings from the app config directory. Returns None if no settings
/// file exists; a corrupt file is logged and also treated as absent.
pub fn load_settings(app_config_dir: &Path) -> Option<AppSettings> {
    let path = crate::paths::settings_path(app_config_dir);
    if !path.exists() {
        return None;
    }
    match read_json::<AppSettings>(&path) {
        Ok(settings) => Some(settings),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            None
        }
    }
}

/// Save settings to the app config directory.
pub fn save_settings(app_config_dir: &Path, settings: &AppSettings) -> Result<(), ProjectError> {
    std::fs::create_dir_all(app_config_dir)?;
    write_json(&crate::paths::settings_path(app_config_dir), settings)
}
