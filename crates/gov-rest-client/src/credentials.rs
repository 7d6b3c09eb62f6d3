//! Process-wide credential store
//!
//! Holds the bearer token and the user profile it was issued for. The store
//! is written only by login, logout and authentication-failure handling;
//! every read is a snapshot taken under the lock, so a reader never sees a
//! token paired with another user's profile.

use gov_api_contract::Credential;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::RestClientResult;

/// Shared handle to the current credential; clones share state
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    current: Arc<RwLock<Option<Credential>>>,
    path: Option<Arc<PathBuf>>,
}

impl CredentialStore {
    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A store backed by a JSON file, loading any credential already saved there
    pub async fn persistent(path: impl Into<PathBuf>) -> RestClientResult<Self> {
        let path = path.into();
        let current = load_credential(&path).await?;
        if current.is_some() {
            debug!("Loaded saved credential from {}", path.display());
        }
        Ok(Self {
            current: Arc::new(RwLock::new(current)),
            path: Some(Arc::new(path)),
        })
    }

    /// Backing file, if the store is persistent
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    pub async fn snapshot(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|c| c.token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Record a successful login
    pub async fn login(&self, credential: Credential) -> RestClientResult<()> {
        let mut current = self.current.write().await;
        if let Some(path) = &self.path {
            let data = serde_json::to_vec_pretty(&credential)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path.as_path(), data).await?;
        }
        info!("Stored credential for user {}", credential.user.username);
        *current = Some(credential);
        Ok(())
    }

    /// Forget the credential (explicit logout)
    pub async fn logout(&self) -> RestClientResult<()> {
        info!("Logging out");
        self.clear().await
    }

    /// Remove the token and user record, in memory and on disk
    pub(crate) async fn clear(&self) -> RestClientResult<()> {
        let mut current = self.current.write().await;
        *current = None;
        if let Some(path) = &self.path {
            match tokio::fs::remove_file(path.as_path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

async fn load_credential(path: &Path) -> RestClientResult<Option<Credential>> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&data) {
        Ok(credential) => Ok(Some(credential)),
        Err(e) => {
            warn!("Ignoring unreadable credential file {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_api_contract::UserProfile;
    use tempfile::TempDir;

    fn credential(token: &str) -> Credential {
        Credential {
            token: token.to_string(),
            user: UserProfile {
                username: "admin".into(),
                full_name: Some("Administrator".into()),
                email: None,
                role: Some("admin".into()),
            },
        }
    }

    #[tokio::test]
    async fn test_in_memory_login_logout() {
        let store = CredentialStore::in_memory();
        assert!(!store.is_authenticated().await);

        store.login(credential("t1")).await.unwrap();
        assert_eq!(store.token().await.as_deref(), Some("t1"));

        store.logout().await.unwrap();
        assert!(store.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = CredentialStore::in_memory();
        let other = store.clone();
        store.login(credential("shared")).await.unwrap();
        assert_eq!(other.token().await.as_deref(), Some("shared"));
    }

    #[tokio::test]
    async fn test_persistent_store_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gov").join("credentials.json");

        let store = CredentialStore::persistent(&path).await.unwrap();
        store.login(credential("persisted")).await.unwrap();
        assert!(path.exists());

        let reloaded = CredentialStore::persistent(&path).await.unwrap();
        assert_eq!(reloaded.snapshot().await, Some(credential("persisted")));

        reloaded.logout().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = CredentialStore::persistent(&path).await.unwrap();
        assert!(!store.is_authenticated().await);
    }
}
