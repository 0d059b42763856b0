//! `{ "state": ..., "version": ... }` envelope shared by the persisted stores.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::storage::StateStorage;

/// Version written next to every persisted state.
pub const STATE_VERSION: u32 = 0;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
  state: &'a T,
  version: u32,
}

#[derive(Deserialize)]
struct Envelope<T> {
  state: T,
  #[serde(default)]
  version: u32,
}

/// Read and decode the state stored under `key`.
///
/// Missing, unreadable or incompatible payloads yield `None`; the caller
/// starts from its defaults.
pub fn hydrate<T: DeserializeOwned>(storage: &dyn StateStorage, key: &str) -> Option<T> {
  let raw = match storage.get_item(key) {
    Ok(Some(raw)) => raw,
    Ok(None) => return None,
    Err(e) => {
      tracing::warn!(key, backend = storage.name(), error = %e, "failed to read persisted state");
      return None;
    }
  };

  let envelope: Envelope<T> = match serde_json::from_str(&raw) {
    Ok(envelope) => envelope,
    Err(e) => {
      tracing::warn!(key, error = %e, "ignoring corrupt persisted state");
      return None;
    }
  };

  if envelope.version != STATE_VERSION {
    tracing::warn!(
      key,
      found = envelope.version,
      expected = STATE_VERSION,
      "ignoring persisted state with unknown version"
    );
    return None;
  }

  Some(envelope.state)
}

/// Encode and write `state` under `key`. Failures are logged, never raised.
pub fn persist<T: Serialize>(storage: &dyn StateStorage, key: &str, state: &T) {
  let envelope = EnvelopeRef {
    state,
    version: STATE_VERSION,
  };

  let raw = match serde_json::to_string(&envelope) {
    Ok(raw) => raw,
    Err(e) => {
      tracing::warn!(key, error = %e, "failed to serialize state");
      return;
    }
  };

  if let Err(e) = storage.set_item(key, &raw) {
    tracing::warn!(key, backend = storage.name(), error = %e, "failed to persist state");
  }
}
