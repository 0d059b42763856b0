//! Persistent authentication session.

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

use super::persist;
use super::storage::StateStorage;

/// Storage key of the persisted session.
pub const AUTH_STORAGE_KEY: &str = "auth-storage";

/// Signed-in user identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default)]
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub roles: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gender: Option<String>,
}

impl User {
  /// "First Last", falling back to the username, then the email.
  pub fn display_name(&self) -> String {
    let full = [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .collect::<Vec<_>>()
      .join(" ");
    if !full.is_empty() {
      return full;
    }
    self
      .username
      .clone()
      .unwrap_or_else(|| self.email.clone())
  }
}

/// The backend sends numeric ids; older payloads used strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Str(String),
    Num(i64),
  }

  Ok(match Id::deserialize(deserializer)? {
    Id::Str(s) => s,
    Id::Num(n) => n.to_string(),
  })
}

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub user: Option<User>,
  pub token: Option<String>,
  #[serde(default)]
  pub is_logged_in: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub refresh_token: Option<String>,
}

/// Owner of the [`Session`].
///
/// Every setter updates memory first and then writes through to storage.
/// Storage failures are logged and otherwise ignored.
pub struct AuthStore {
  state: Mutex<Session>,
  storage: Arc<dyn StateStorage>,
}

impl AuthStore {
  /// Create a store, hydrating from `storage` if a session was saved.
  pub fn new(storage: Arc<dyn StateStorage>) -> Self {
    let mut session: Session =
      persist::hydrate(storage.as_ref(), AUTH_STORAGE_KEY).unwrap_or_default();
    session.is_logged_in = session.user.is_some();

    if session.is_logged_in {
      tracing::debug!("restored persisted session");
    }

    Self {
      state: Mutex::new(session),
      storage,
    }
  }

  fn lock(&self) -> MutexGuard<'_, Session> {
    // A poisoned guard still holds a consistent Session: every update below
    // replaces fields without panicking in between.
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Apply `f` and persist the resulting state, both under the lock, so
  /// writes reach storage in the order they were applied.
  fn update(&self, f: impl FnOnce(&mut Session)) {
    let mut session = self.lock();
    f(&mut session);
    session.is_logged_in = session.user.is_some();
    persist::persist(self.storage.as_ref(), AUTH_STORAGE_KEY, &*session);
  }

  pub fn snapshot(&self) -> Session {
    self.lock().clone()
  }

  pub fn token(&self) -> Option<String> {
    self.lock().token.clone()
  }

  pub fn refresh_token(&self) -> Option<String> {
    self.lock().refresh_token.clone()
  }

  pub fn user(&self) -> Option<User> {
    self.lock().user.clone()
  }

  pub fn is_logged_in(&self) -> bool {
    self.lock().is_logged_in
  }

  pub fn set_token(&self, token: Option<String>) {
    self.update(|s| s.token = token);
  }

  pub fn set_refresh_token(&self, refresh_token: Option<String>) {
    self.update(|s| s.refresh_token = refresh_token);
  }

  pub fn set_user(&self, user: Option<User>) {
    self.update(|s| s.user = user);
  }

  /// Store a freshly authenticated user and its tokens in one transition.
  pub fn login(&self, user: User, token: String, refresh_token: Option<String>) {
    self.update(|s| {
      s.user = Some(user);
      s.token = Some(token);
      s.refresh_token = refresh_token;
    });
  }

  pub fn logout(&self) {
    self.update(|s| *s = Session::default());
  }

  /// Same transition as [`logout`](Self::logout); used when the server
  /// rejects the credentials rather than on user request.
  pub fn clear_auth(&self) {
    self.update(|s| *s = Session::default());
  }
}
