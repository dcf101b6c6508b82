use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_core::model::{AuthToken, Identity};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// What survives a restart: the bearer token and who it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub token: AuthToken,
    pub identity: Identity,
    pub saved_at: DateTime<Utc>,
}

/// Local store for the single logged-in session.
#[async_trait]
pub trait AuthSessionRepository: Send + Sync {
    /// Load the persisted session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read or the record is corrupt.
    async fn load_session(&self) -> Result<Option<PersistedSession>, StorageError>;

    /// Replace the persisted session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn save_session(&self, session: &PersistedSession) -> Result<(), StorageError>;

    /// Remove the persisted session. Clearing an empty store is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn clear_session(&self) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    session: Arc<Mutex<Option<PersistedSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthSessionRepository for InMemoryRepository {
    async fn load_session(&self) -> Result<Option<PersistedSession>, StorageError> {
        let guard = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_session(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub auth_sessions: Arc<dyn AuthSessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let auth_sessions: Arc<dyn AuthSessionRepository> = Arc::new(InMemoryRepository::new());
        Self { auth_sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::model::AdminAccount;
    use portal_core::time::fixed_now;

    fn admin_session() -> PersistedSession {
        PersistedSession {
            token: AuthToken::new("tok-1"),
            identity: Identity::Admin(AdminAccount {
                user_id: 1,
                username: "admin".into(),
                email: "admin@example.mg".into(),
            }),
            saved_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn save_load_clear() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.load_session().await.unwrap(), None);

        repo.save_session(&admin_session()).await.unwrap();
        let loaded = repo.load_session().await.unwrap().unwrap();
        assert!(loaded.identity.is_admin());
        assert_eq!(loaded.token.as_str(), "tok-1");

        repo.clear_session().await.unwrap();
        repo.clear_session().await.unwrap();
        assert_eq!(repo.load_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn storage_clones_share_state() {
        let storage = Storage::in_memory();
        let other = storage.clone();
        storage
            .auth_sessions
            .save_session(&admin_session())
            .await
            .unwrap();
        assert!(other.auth_sessions.load_session().await.unwrap().is_some());
    }
}
