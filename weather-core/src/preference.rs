//! Persistence for the last-selected unit system.
//!
//! Stores never fail: a host without usable storage reads as "nothing saved"
//! and ignores writes.

use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::model::UnitSystem;

pub trait UnitPreferenceStore: Send + Sync + Debug {
    fn read(&self) -> Option<UnitSystem>;
    fn write(&self, units: UnitSystem);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(rename = "weather.units", default, skip_serializing_if = "Option::is_none")]
    units: Option<String>,
}

/// TOML file holding the `weather.units` key.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: Option<PathBuf>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    /// Platform data directory, or no storage at all if it can't be determined.
    pub fn platform_default() -> Self {
        match crate::WidgetConfig::preferences_file_path() {
            Ok(path) => Self::new(path),
            Err(e) => {
                tracing::warn!("Unit preference storage unavailable: {e}");
                Self { path: None }
            }
        }
    }

    fn load(path: &Path) -> Option<PreferenceFile> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}", path.display());
                return None;
            }
        };

        match toml::from_str(&contents) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!("Ignoring malformed preference file {}: {e}", path.display());
                None
            }
        }
    }

    fn store(path: &Path, file: &PreferenceFile) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string(file).context("Failed to serialize preferences")?;
        fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
    }
}

impl UnitPreferenceStore for FilePreferences {
    fn read(&self) -> Option<UnitSystem> {
        let file = Self::load(self.path.as_deref()?)?;
        // Only the two known values count; anything else reads as absent.
        UnitSystem::try_from(file.units?.as_str()).ok()
    }

    fn write(&self, units: UnitSystem) {
        let Some(path) = self.path.as_deref() else { return };

        let mut file = Self::load(path).unwrap_or_default();
        file.units = Some(units.as_str().to_string());

        if let Err(e) = Self::store(path, &file) {
            tracing::warn!("Unit preference not saved: {e:#}");
        }
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    units: Mutex<Option<UnitSystem>>,
}

impl MemoryPreferences {
    pub fn with(units: UnitSystem) -> Self {
        Self { units: Mutex::new(Some(units)) }
    }
}

impl UnitPreferenceStore for MemoryPreferences {
    fn read(&self) -> Option<UnitSystem> {
        self.units.lock().map(|u| *u).unwrap_or_default()
    }

    fn write(&self, units: UnitSystem) {
        if let Ok(mut guard) = self.units.lock() {
            *guard = Some(units);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferences::new(dir.path().join("prefs").join("preferences.toml"));

        assert_eq!(store.read(), None);
        store.write(UnitSystem::Imperial);
        assert_eq!(store.read(), Some(UnitSystem::Imperial));

        let raw = fs::read_to_string(dir.path().join("prefs").join("preferences.toml")).unwrap();
        assert!(raw.contains("\"weather.units\" = \"imperial\""));
    }

    #[test]
    fn unknown_stored_value_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        fs::write(&path, "\"weather.units\" = \"kelvin\"\n").unwrap();

        assert_eq!(FilePreferences::new(path).read(), None);
    }

    #[test]
    fn malformed_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        fs::write(&path, "not = [valid").unwrap();

        assert_eq!(FilePreferences::new(path).read(), None);
    }

    #[test]
    fn unwritable_location_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        // Parent is a regular file, so directory creation fails.
        let store = FilePreferences::new(blocker.join("preferences.toml"));
        store.write(UnitSystem::Imperial);
        assert_eq!(store.read(), None);
    }

    #[test]
    fn store_without_storage_is_silent() {
        let store = FilePreferences { path: None };
        store.write(UnitSystem::Imperial);
        assert_eq!(store.read(), None);
    }

    #[test]
    fn memory_store() {
        let store = MemoryPreferences::default();
        assert_eq!(store.read(), None);
        store.write(UnitSystem::Metric);
        assert_eq!(store.read(), Some(UnitSystem::Metric));
        assert_eq!(MemoryPreferences::with(UnitSystem::Imperial).read(), Some(UnitSystem::Imperial));
    }
}
