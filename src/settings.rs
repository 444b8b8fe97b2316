//! Persisted client preferences.
//!
//! Stored at `{data_dir}/preferences.json`. The only preference today is the
//! dashboard theme, kept under the `theme` key.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Unknown values are dropped on load so a bad file falls back to light.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_theme"
    )]
    pub theme: Option<Theme>,
}

fn lenient_theme<'de, D>(deserializer: D) -> Result<Option<Theme>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}

/// In-memory preferences with disk persistence.
#[derive(Debug)]
pub struct PreferencesStore {
    preferences: RwLock<Preferences>,
    storage_path: PathBuf,
}

impl PreferencesStore {
    /// Create a store rooted at `data_dir`, loading from disk if available.
    pub fn new(data_dir: &Path) -> Self {
        let storage_path = data_dir.join(PREFERENCES_FILE);

        let preferences = if storage_path.exists() {
            match Self::load_from_path(&storage_path) {
                Ok(p) => {
                    tracing::debug!("Loaded preferences from {}", storage_path.display());
                    p
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load preferences from {}: {}, using defaults",
                        storage_path.display(),
                        e
                    );
                    Preferences::default()
                }
            }
        } else {
            Preferences::default()
        };

        Self {
            preferences: RwLock::new(preferences),
            storage_path,
        }
    }

    fn load_from_path(path: &Path) -> Result<Preferences, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    async fn save_to_disk(&self) -> Result<(), std::io::Error> {
        let preferences = self.preferences.read().await;

        if let Some(parent) = self.storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&*preferences)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(&self.storage_path, contents)?;
        tracing::debug!("Saved preferences to {}", self.storage_path.display());
        Ok(())
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Stored theme, or light when nothing valid is stored.
    pub async fn theme(&self) -> Theme {
        self.preferences.read().await.theme.unwrap_or_default()
    }

    /// Update the theme.
    ///
    /// Returns `(changed, previous_value)`.
    pub async fn set_theme(&self, theme: Theme) -> Result<(bool, Theme), std::io::Error> {
        let mut preferences = self.preferences.write().await;
        let previous = preferences.theme.unwrap_or_default();
        let changed = preferences.theme != Some(theme);

        preferences.theme = Some(theme);
        drop(preferences); // Release lock before saving
        if changed {
            self.save_to_disk().await?;
        }
        Ok((changed, previous))
    }

    /// Flip between light and dark and persist. Returns the new theme.
    pub async fn toggle_theme(&self) -> Result<Theme, std::io::Error> {
        let next = self.theme().await.toggled();
        self.set_theme(next).await?;
        Ok(next)
    }
}

pub type SharedPreferencesStore = Arc<PreferencesStore>;
