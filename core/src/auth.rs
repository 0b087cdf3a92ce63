use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: AuthUser,
}

/// Session capability every page is handed.
pub trait AuthService: Send + Sync {
    fn current_session(&self) -> impl Future<Output = Result<Option<Session>>> + Send;

    /// Receiver that observes every session change, including sign-out.
    fn on_session_change(&self) -> watch::Receiver<Option<Session>>;

    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Holds the current session and optionally persists it as JSON, so later
/// invocations start signed in.
pub struct SessionStore {
    tx: watch::Sender<Option<Session>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            tx: watch::Sender::new(None),
            path: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let session = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session file: {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(session) => Some(session),
                Err(err) => {
                    tracing::warn!("ignoring unreadable session file {}: {err}", path.display());
                    None
                }
            }
        } else {
            None
        };
        Ok(Self {
            tx: watch::Sender::new(session),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn session(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn set_session(&self, session: Session) -> Result<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&session)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write session file: {}", path.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                    .context("Failed to set session file permissions")?;
            }
        }
        tracing::debug!(user = %session.user.id, "session established");
        self.tx.send_replace(Some(session));
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if let Some(path) = &self.path {
            if path.exists() {
                std::fs::remove_file(path).with_context(|| {
                    format!("Failed to remove session file: {}", path.display())
                })?;
            }
        }
        self.tx.send_replace(None);
        Ok(())
    }
}

impl AuthService for SessionStore {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session())
    }

    fn on_session_change(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    async fn sign_out(&self) -> Result<()> {
        self.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session {
            access_token: "token-abc".to_string(),
            user: AuthUser {
                id: Uuid::new_v4(),
                email: "me@example.com".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_in_memory_starts_signed_out() {
        let store = SessionStore::in_memory();
        assert!(store.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = sample_session();

        let store = SessionStore::open(&path).unwrap();
        store.set_session(session.clone()).unwrap();

        let reopened = SessionStore::open(&path).unwrap();
        assert_eq!(reopened.current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_sign_out_removes_file_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::open(&path).unwrap();
        store.set_session(sample_session()).unwrap();

        let mut rx = store.on_session_change();
        store.sign_out().await.unwrap();

        assert!(!path.exists());
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn test_corrupt_session_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let store = SessionStore::open(&path).unwrap();
        assert!(store.session().is_none());
    }
}
