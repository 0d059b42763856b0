//! Persisted client state: the auth session and user settings.
//!
//! Both stores are plain values built over a [`StateStorage`] backend, so
//! tests can create as many isolated instances as they need.

mod auth;
mod persist;
mod settings;
mod storage;

pub use auth::{AuthStore, Session, User, AUTH_STORAGE_KEY};
pub use settings::{Settings, SettingsError, SettingsStore, Theme, SETTINGS_STORAGE_KEY};
pub use storage::{
  default_data_dir, open_storage, FileStorage, MemoryStorage, SqliteStorage, StateStorage,
  StorageError,
};
