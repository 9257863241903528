use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// The live session: one access token and, when the backend issued one, the
/// refresh token it can be exchanged with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(rename = "access")]
    pub access_token: String,
    #[serde(rename = "refresh", default)]
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt credentials file: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where the single live [`CredentialPair`] is kept.
///
/// Owned by the composition root and shared with the
/// [`Authenticator`](crate::auth::Authenticator) by reference.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self) -> Result<Option<CredentialPair>, CredentialError>;

    async fn set(&self, pair: CredentialPair) -> Result<(), CredentialError>;

    async fn clear(&self) -> Result<(), CredentialError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<CredentialPair>, CredentialError> {
        Ok(self.pair.read().await.clone())
    }

    async fn set(&self, pair: CredentialPair) -> Result<(), CredentialError> {
        *self.pair.write().await = Some(pair);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        *self.pair.write().await = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(flatten)]
    pair: CredentialPair,
    stored_at: DateTime<Utc>,
}

/// JSON file store, e.g. `~/.config/nextstep/cli/credentials.json`:
///
/// ```json
/// { "access": "...", "refresh": "...", "stored_at": "2026-10-18T09:00:00Z" }
/// ```
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the current pair was written, if there is one.
    pub async fn stored_at(&self) -> Result<Option<DateTime<Utc>>, CredentialError> {
        Ok(self.read().await?.map(|stored| stored.stored_at))
    }

    async fn read(&self) -> Result<Option<StoredCredentials>, CredentialError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Option<CredentialPair>, CredentialError> {
        Ok(self.read().await?.map(|stored| stored.pair))
    }

    async fn set(&self, pair: CredentialPair) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let stored = StoredCredentials {
            pair,
            stored_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&stored)?;

        // Write then rename so a reader never sees a half-written file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        restrict_permissions(&tmp).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock().await;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
