//! Persistent user preferences.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::persist;
use super::storage::StateStorage;

/// Storage key of the persisted settings.
pub const SETTINGS_STORAGE_KEY: &str = "settings-storage";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark,
}

impl fmt::Display for Theme {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Theme::Light => f.write_str("light"),
      Theme::Dark => f.write_str("dark"),
    }
  }
}

impl FromStr for Theme {
  type Err = SettingsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "light" => Ok(Theme::Light),
      "dark" => Ok(Theme::Dark),
      other => Err(SettingsError::InvalidValue {
        key: "theme".to_string(),
        reason: format!("unknown theme {:?}, expected light or dark", other),
      }),
    }
  }
}

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("invalid value for {key}: {reason}")]
  InvalidValue { key: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
  /// Unknown persisted themes fall back to the default
  #[serde(default, deserialize_with = "lenient_theme")]
  pub theme: Theme,
  #[serde(default = "default_language")]
  pub language: String,
  /// Free-form preferences, stored next to the typed fields
  #[serde(flatten)]
  pub preferences: BTreeMap<String, Value>,
}

fn lenient_theme<'de, D>(deserializer: D) -> Result<Theme, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  match value.as_str().map(str::parse::<Theme>) {
    Some(Ok(theme)) => Ok(theme),
    _ => {
      tracing::warn!(theme = %value, "ignoring unknown persisted theme");
      Ok(Theme::default())
    }
  }
}

fn default_language() -> String {
  "en".to_string()
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      theme: Theme::default(),
      language: default_language(),
      preferences: BTreeMap::new(),
    }
  }
}

pub struct SettingsStore {
  state: Mutex<Settings>,
  storage: Arc<dyn StateStorage>,
}

impl SettingsStore {
  pub fn new(storage: Arc<dyn StateStorage>) -> Self {
    Self::with_initial(storage, Settings::default())
  }

  /// Create a store that starts from `initial` when nothing was persisted.
  pub fn with_initial(storage: Arc<dyn StateStorage>, initial: Settings) -> Self {
    let settings = persist::hydrate(storage.as_ref(), SETTINGS_STORAGE_KEY).unwrap_or(initial);
    Self {
      state: Mutex::new(settings),
      storage,
    }
  }

  fn lock(&self) -> MutexGuard<'_, Settings> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Apply `f` and persist under the lock; see `AuthStore::update`.
  fn update(&self, f: impl FnOnce(&mut Settings)) {
    let mut settings = self.lock();
    f(&mut settings);
    persist::persist(self.storage.as_ref(), SETTINGS_STORAGE_KEY, &*settings);
  }

  pub fn snapshot(&self) -> Settings {
    self.lock().clone()
  }

  pub fn theme(&self) -> Theme {
    self.lock().theme
  }

  pub fn language(&self) -> String {
    self.lock().language.clone()
  }

  pub fn preference(&self, key: &str) -> Option<Value> {
    let settings = self.lock();
    match key {
      "theme" => Some(Value::String(settings.theme.to_string())),
      "language" => Some(Value::String(settings.language.clone())),
      _ => settings.preferences.get(key).cloned(),
    }
  }

  pub fn set_theme(&self, theme: Theme) {
    self.update(|s| s.theme = theme);
  }

  pub fn set_language(&self, language: impl Into<String>) {
    let language = language.into();
    self.update(|s| s.language = language);
  }

  /// Set any preference by name. `theme` and `language` are routed to
  /// their typed fields and validated.
  pub fn set_preference(&self, key: &str, value: Value) -> Result<(), SettingsError> {
    match key {
      "theme" => {
        let theme = value
          .as_str()
          .ok_or_else(|| SettingsError::InvalidValue {
            key: key.to_string(),
            reason: "expected a string".to_string(),
          })?
          .parse()?;
        self.set_theme(theme);
      }
      "language" => {
        let language = value
          .as_str()
          .ok_or_else(|| SettingsError::InvalidValue {
            key: key.to_string(),
            reason: "expected a string".to_string(),
          })?
          .to_string();
        self.set_language(language);
      }
      _ => {
        let key = key.to_string();
        self.update(|s| {
          s.preferences.insert(key, value);
        });
      }
    }
    Ok(())
  }
}
