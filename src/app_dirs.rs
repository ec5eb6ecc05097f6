use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "letterdrill";

/// Overrides the state directory (statistics database) when set
pub const STATE_DIR_ENV: &str = "LETTERDRILL_STATE_DIR";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$LETTERDRILL_STATE_DIR`, else `$HOME/.local/state/letterdrill`, else the platform data dir
    pub fn state_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
            return Some(PathBuf::from(dir));
        }
        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".local").join("state").join(APP_NAME));
        }
        ProjectDirs::from("", "", APP_NAME).map(|pd| pd.data_local_dir().to_path_buf())
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("stats.db"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|pd| pd.config_dir().join("settings.json"))
    }
}
