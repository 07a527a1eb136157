use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::IssuedCredentials;

/// Keychain service name used when the config does not override it
pub const DEFAULT_SERVICE_NAME: &str = "authbridge";

/// Well-known keys read by the rest of the application.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const SESSION_TOKEN_KEY: &str = "sessionToken";
pub const USER_KEY: &str = "user";

pub const CREDENTIAL_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    SESSION_TOKEN_KEY,
    USER_KEY,
];

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Keychain error for {key}: {source}")]
    Keyring {
        key: String,
        #[source]
        source: keyring::Error,
    },

    #[error("Failed to serialize user record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value storage for issued credentials.
pub trait CredentialStore: Send + Sync {
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError>;

    fn get(&self, key: &str) -> Result<Option<String>, CredentialError>;

    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), CredentialError>;
}

/// The four credential entries as stored, with the user record as JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub session_token: String,
    pub user: String,
}

impl StoredCredentials {
    pub fn from_issued(issued: &IssuedCredentials) -> Result<Self, CredentialError> {
        Ok(Self {
            access_token: issued.access_token.clone(),
            refresh_token: issued.refresh_token.clone(),
            session_token: issued.session_token.clone(),
            user: serde_json::to_string(&issued.user)?,
        })
    }

    fn entries(&self) -> [(&'static str, &str); 4] {
        [
            (ACCESS_TOKEN_KEY, self.access_token.as_str()),
            (REFRESH_TOKEN_KEY, self.refresh_token.as_str()),
            (SESSION_TOKEN_KEY, self.session_token.as_str()),
            (USER_KEY, self.user.as_str()),
        ]
    }

    /// Write all four entries. Every write is attempted; the first failure is
    /// returned after the rest have been tried.
    pub fn persist(&self, store: &dyn CredentialStore) -> Result<(), CredentialError> {
        let mut first_error = None;
        for (key, value) in self.entries() {
            if let Err(e) = store.set(key, value) {
                warn!(key, error = %e, "Failed to store credential");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                debug!("Credentials stored");
                Ok(())
            }
        }
    }

    /// Read the entries back. Returns `None` unless all four are present.
    pub fn load(store: &dyn CredentialStore) -> Result<Option<Self>, CredentialError> {
        let access_token = store.get(ACCESS_TOKEN_KEY)?;
        let refresh_token = store.get(REFRESH_TOKEN_KEY)?;
        let session_token = store.get(SESSION_TOKEN_KEY)?;
        let user = store.get(USER_KEY)?;

        match (access_token, refresh_token, session_token, user) {
            (Some(access_token), Some(refresh_token), Some(session_token), Some(user)) => {
                Ok(Some(Self {
                    access_token,
                    refresh_token,
                    session_token,
                    user,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Remove all four entries (sign-out).
    pub fn clear(store: &dyn CredentialStore) -> Result<(), CredentialError> {
        let mut first_error = None;
        for key in CREDENTIAL_KEYS {
            if let Err(e) = store.remove(key) {
                warn!(key, error = %e, "Failed to remove credential");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Parse the stored user record
    pub fn user_value(&self) -> Result<serde_json::Value, CredentialError> {
        Ok(serde_json::from_str(&self.user)?)
    }
}

/// OS keychain storage, one entry per credential key.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, CredentialError> {
        Entry::new(&self.service, key).map_err(|source| CredentialError::Keyring {
            key: key.to_string(),
            source,
        })
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|source| CredentialError::Keyring {
                key: key.to_string(),
                source,
            })
    }

    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(source) => Err(CredentialError::Keyring {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(source) => Err(CredentialError::Keyring {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// In-process storage. Counts writes so callers can tell whether a flow
/// touched the store at all.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls made so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().map(|e| e.is_empty()).unwrap_or(true)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CredentialError> {
        self.entries
            .lock()
            .map_err(|_| CredentialError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), CredentialError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issued() -> IssuedCredentials {
        IssuedCredentials {
            access_token: "A".to_string(),
            refresh_token: "R".to_string(),
            session_token: "S".to_string(),
            user: json!({"id": 1, "name": "Ann"}),
        }
    }

    /// Rejects writes to one key, accepts the rest
    struct FailingStore {
        inner: MemoryCredentialStore,
        failing_key: &'static str,
    }

    impl CredentialStore for FailingStore {
        fn set(&self, key: &str, value: &str) -> Result<(), CredentialError> {
            if key == self.failing_key {
                return Err(CredentialError::Unavailable("quota exceeded".to_string()));
            }
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> Result<Option<String>, CredentialError> {
            self.inner.get(key)
        }

        fn remove(&self, key: &str) -> Result<(), CredentialError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_from_issued_serializes_user_compactly() {
        let stored = StoredCredentials::from_issued(&issued()).unwrap();
        assert_eq!(stored.user, r#"{"id":1,"name":"Ann"}"#);
    }

    #[test]
    fn test_persist_writes_all_four_keys() {
        let store = MemoryCredentialStore::new();
        StoredCredentials::from_issued(&issued())
            .unwrap()
            .persist(&store)
            .unwrap();

        assert_eq!(store.write_count(), 4);
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("A"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R"));
        assert_eq!(store.get(SESSION_TOKEN_KEY).unwrap().as_deref(), Some("S"));
        assert_eq!(
            store.get(USER_KEY).unwrap().as_deref(),
            Some(r#"{"id":1,"name":"Ann"}"#)
        );
    }

    #[test]
    fn test_persist_attempts_remaining_keys_after_failure() {
        let store = FailingStore {
            inner: MemoryCredentialStore::new(),
            failing_key: ACCESS_TOKEN_KEY,
        };
        let result = StoredCredentials::from_issued(&issued()).unwrap().persist(&store);

        assert!(matches!(result, Err(CredentialError::Unavailable(_))));
        assert_eq!(store.inner.write_count(), 3);
        assert_eq!(store.get(USER_KEY).unwrap().as_deref(), Some(r#"{"id":1,"name":"Ann"}"#));
    }

    #[test]
    fn test_load_requires_all_keys() {
        let store = MemoryCredentialStore::new();
        assert_eq!(StoredCredentials::load(&store).unwrap(), None);

        store.set(ACCESS_TOKEN_KEY, "A").unwrap();
        assert_eq!(StoredCredentials::load(&store).unwrap(), None);

        let stored = StoredCredentials::from_issued(&issued()).unwrap();
        stored.persist(&store).unwrap();
        assert_eq!(StoredCredentials::load(&store).unwrap(), Some(stored));
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = MemoryCredentialStore::new();
        StoredCredentials::from_issued(&issued())
            .unwrap()
            .persist(&store)
            .unwrap();

        StoredCredentials::clear(&store).unwrap();
        assert!(store.is_empty());
        // Clearing twice is fine
        StoredCredentials::clear(&store).unwrap();
    }

    #[test]
    #[ignore = "needs an OS keychain"]
    fn test_keyring_store_persists_across_instances() {
        let service = format!("{}-test-{}", DEFAULT_SERVICE_NAME, std::process::id());
        let writer = KeyringCredentialStore::new(service.clone());
        writer.set(ACCESS_TOKEN_KEY, "A").unwrap();

        let reader = KeyringCredentialStore::new(service);
        let value = reader.get(ACCESS_TOKEN_KEY);
        reader.remove(ACCESS_TOKEN_KEY).unwrap();

        assert_eq!(value.unwrap().as_deref(), Some("A"));
        assert_eq!(reader.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_user_value_round_trips_record() {
        let stored = StoredCredentials::from_issued(&issued()).unwrap();
        assert_eq!(stored.user_value().unwrap(), json!({"id": 1, "name": "Ann"}));
    }
}
