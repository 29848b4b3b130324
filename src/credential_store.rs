//! Remembers each Telegram user's portal credentials so the refresh button
//! works across restarts.

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential store {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// JSON file of credentials keyed by Telegram user id.
pub struct CredentialStore {
    path: PathBuf,
    entries: RwLock<HashMap<i64, Credentials>>,
}

impl CredentialStore {
    /// Opens the store, starting empty when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no credential store at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        info!("loaded {} saved logins from {}", entries.len(), path.display());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub async fn get(&self, user_id: i64) -> Option<Credentials> {
        self.entries.read().await.get(&user_id).cloned()
    }

    /// Remembers credentials and writes the whole store back to disk.
    pub async fn remember(&self, user_id: i64, credentials: Credentials) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(user_id, credentials);
        self.flush(&entries).await
    }

    async fn flush(&self, entries: &HashMap<i64, Credentials>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(username: &str) -> Credentials {
        Credentials {
            username: username.into(),
            password: "pw".into(),
        }
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("s.json")).await.unwrap();
        assert_eq!(store.get(1).await, None);
    }

    #[tokio::test]
    async fn remembered_credentials_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");

        let store = CredentialStore::open(&path).await.unwrap();
        store.remember(42, creds("alice")).await.unwrap();
        store.remember(42, creds("alice2")).await.unwrap();
        store.remember(7, creds("bob")).await.unwrap();
        drop(store);

        let reopened = CredentialStore::open(&path).await.unwrap();
        assert_eq!(reopened.get(42).await, Some(creds("alice2")));
        assert_eq!(reopened.get(7).await, Some(creds("bob")));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = CredentialStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
