//! Key-value token store for the Threads session.
//!
//! Batched writes replace the whole map under a write lock, so readers see
//! either every entry of a `set_all`/`clear_all` or none of them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::services::encryption::{EncryptionError, SessionCipher};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    async fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), SessionStoreError>;

    async fn clear_all(&self, keys: &[&str]) -> Result<(), SessionStoreError>;
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), SessionStoreError> {
        let mut map = self.entries.write().await;
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    async fn clear_all(&self, keys: &[&str]) -> Result<(), SessionStoreError> {
        let mut map = self.entries.write().await;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// Store persisted as a JSON map, optionally sealed with AES-256-GCM.
///
/// The file is rewritten through a temporary sibling and a rename.
pub struct FileSessionStore {
    path: PathBuf,
    cipher: Option<SessionCipher>,
    entries: RwLock<HashMap<String, String>>,
}

impl FileSessionStore {
    pub async fn open(
        path: impl AsRef<Path>,
        cipher: Option<SessionCipher>,
    ) -> Result<Self, SessionStoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => HashMap::new(),
            Ok(text) => decode(&text, cipher.as_ref())?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            encrypted = cipher.is_some(),
            keys = entries.len(),
            "Session store opened"
        );

        Ok(Self {
            path,
            cipher,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), SessionStoreError> {
        let json = serde_json::to_string(entries)?;
        let body = match &self.cipher {
            Some(cipher) => cipher.seal(json.as_bytes())?,
            None => json,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Session store persisted");
        Ok(())
    }
}

fn decode(
    text: &str,
    cipher: Option<&SessionCipher>,
) -> Result<HashMap<String, String>, SessionStoreError> {
    match cipher {
        Some(cipher) => {
            let plain = cipher.open(text)?;
            Ok(serde_json::from_slice(&plain)?)
        }
        None => Ok(serde_json::from_str(text)?),
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), SessionStoreError> {
        let mut map = self.entries.write().await;
        let mut next = map.clone();
        for (key, value) in entries {
            next.insert((*key).to_string(), (*value).to_string());
        }
        self.persist(&next).await?;
        *map = next;
        Ok(())
    }

    async fn clear_all(&self, keys: &[&str]) -> Result<(), SessionStoreError> {
        let mut map = self.entries.write().await;
        let mut next = map.clone();
        for key in keys {
            next.remove(*key);
        }
        self.persist(&next).await?;
        *map = next;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file is not valid JSON: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}
