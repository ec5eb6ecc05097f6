use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::item::{Alphabet, CaseFilter};
use crate::round::RoundConfiguration;
use crate::weight::Difficulty;

/// The learner's saved round preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PracticeSettings {
    pub round_size: usize,
    pub case_filter: CaseFilter,
    pub difficulty: Difficulty,
    pub alphabet: Alphabet,
    pub letters: Option<Vec<char>>,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            round_size: 10,
            case_filter: CaseFilter::Lower,
            difficulty: Difficulty::Standard,
            alphabet: Alphabet::English,
            letters: None,
        }
    }
}

impl From<&PracticeSettings> for RoundConfiguration {
    fn from(settings: &PracticeSettings) -> Self {
        Self {
            round_size: settings.round_size,
            case_filter: settings.case_filter,
            difficulty: settings.difficulty,
            letters: settings.letters.clone(),
            force_bootstrap: false,
        }
    }
}

pub trait SettingsStore {
    fn load(&self) -> PracticeSettings;
    fn save(&self, settings: &PracticeSettings) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::settings_path().unwrap_or_else(|| PathBuf::from("letterdrill_settings.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    /// Missing or unreadable files fall back to the defaults
    fn load(&self) -> PracticeSettings {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable settings at {}: {e}", self.path.display());
                PracticeSettings::default()
            }),
            Err(_) => PracticeSettings::default(),
        }
    }

    fn save(&self, settings: &PracticeSettings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)
    }
}
