use assist::AssistantSettings;
use directories::ProjectDirs;
use doc_model::{ReadingOrderConfig, ReflowConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("settings schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Tunable heuristics and service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reading_order: ReadingOrderConfig,
    pub reflow: ReflowConfig,
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: Settings,
}

#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "inkreflow", "inkreflow").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self::with_root(dirs.data_local_dir()))
    }

    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self { path: root.as_ref().join(SETTINGS_FILE) }
    }

    /// Uses an explicit settings file instead of the project directory.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn settings_path(&self) -> &Path {
        &self.path
    }

    pub fn load_settings(&self) -> Result<Settings, StorageError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let bytes = fs::read(&self.path)?;
        let envelope: SettingsEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > SETTINGS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: envelope.version,
                supported: SETTINGS_SCHEMA_VERSION,
            });
        }

        Ok(envelope.settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path().join("nested"));

        let mut settings = Settings::default();
        settings.reading_order.paragraph_break_threshold = 40.0;
        settings.reflow.margin = 36.0;
        settings.assistant.model = "local".to_owned();

        store.save_settings(&settings).expect("save should succeed");
        let loaded = store.load_settings().expect("load should succeed");

        assert_eq!(loaded, settings);
        assert!(store.settings_path().ends_with("settings.json"));
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_settings().expect("load should succeed");
        assert_eq!(loaded, Settings::default());
        assert_eq!(loaded.reading_order.same_line_tolerance, 5.0);
    }

    #[test]
    fn partial_settings_keep_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("custom.json");
        fs::write(&path, r#"{ "version": 1, "settings": { "reflow": { "margin": 20.0 } } }"#)
            .expect("fixture should be written");

        let loaded = Storage::with_file(&path).load_settings().expect("load should succeed");

        assert_eq!(loaded.reflow.margin, 20.0);
        assert_eq!(loaded.reflow.line_height, ReflowConfig::default().line_height);
        assert_eq!(loaded.reading_order, ReadingOrderConfig::default());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{ "version": 9, "settings": {} }"#).expect("fixture should be written");

        let err = Storage::with_file(&path).load_settings().expect_err("version 9 is unknown");
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 9, supported: 1 }));
    }
}
