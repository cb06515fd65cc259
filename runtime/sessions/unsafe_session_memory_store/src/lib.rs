//! An in-memory session store for `unsafe_session`, geared towards testing and local development.
use indexmap::IndexMap;
use jiff::Timestamp;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use unsafe_session::{
    SessionId,
    store::{
        SessionRecord, SessionRecordRef, SessionStorageBackend,
        errors::{
            BulkDeleteError, CreateError, DeleteError, DuplicateIdError, LoadError,
            UnknownIdError, UpdateError, UpdateExpiryError,
        },
    },
};

#[derive(Clone, Default)]
/// An in-memory session store.
///
/// # Limitations
///
/// This store won't persist data between server restarts.
/// It also won't synchronize data between multiple server instances.
/// It is primarily intended for testing and local development.
pub struct InMemorySessionStore(Arc<Mutex<HashMap<SessionId, StoreRecord>>>);

impl std::fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct StoreRecord {
    state: IndexMap<String, serde_json::Value>,
    created_at: Timestamp,
    expires_at: Timestamp,
}

impl InMemorySessionStore {
    /// Creates a new (empty) in-memory session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of records currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.0.lock().await.len()
    }

    /// `true` if the store holds no records at all.
    pub async fn is_empty(&self) -> bool {
        self.0.lock().await.is_empty()
    }

    async fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&SessionId, &StoreRecord) -> bool,
    {
        let mut guard = self.0.lock().await;
        let before = guard.len();
        guard.retain(|id, record| keep(id, record));
        before - guard.len()
    }
}

#[async_trait::async_trait]
impl SessionStorageBackend for InMemorySessionStore {
    /// Creates a new session record in the store using the provided ID.
    #[tracing::instrument(name = "Create server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn create(
        &self,
        id: &SessionId,
        record: SessionRecordRef<'_>,
    ) -> Result<(), CreateError> {
        let mut guard = self.0.lock().await;
        if guard.contains_key(id) {
            return Err(CreateError::DuplicateId(DuplicateIdError { id: id.clone() }));
        }
        guard.insert(
            id.clone(),
            StoreRecord {
                state: record.state.into_owned(),
                created_at: record.created_at,
                expires_at: record.expires_at,
            },
        );
        Ok(())
    }

    /// Update the state of an existing session in the store.
    ///
    /// The creation time of the existing record is preserved.
    #[tracing::instrument(name = "Update server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn update(
        &self,
        id: &SessionId,
        record: SessionRecordRef<'_>,
    ) -> Result<(), UpdateError> {
        let mut guard = self.0.lock().await;
        let Some(old_record) = guard.get_mut(id) else {
            return Err(UnknownIdError { id: id.clone() }.into());
        };
        old_record.state = record.state.into_owned();
        old_record.expires_at = record.expires_at;
        Ok(())
    }

    /// Update the expiry of an existing session record in the store.
    ///
    /// It leaves the session state unchanged.
    #[tracing::instrument(name = "Update expiry for server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn update_expiry(
        &self,
        id: &SessionId,
        expires_at: Timestamp,
    ) -> Result<(), UpdateExpiryError> {
        let mut guard = self.0.lock().await;
        let Some(old_record) = guard.get_mut(id) else {
            return Err(UnknownIdError { id: id.clone() }.into());
        };
        old_record.expires_at = expires_at;
        Ok(())
    }

    /// Loads an existing session record from the store using the provided ID.
    ///
    /// Expired records are returned as well.
    #[tracing::instrument(name = "Load server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, LoadError> {
        let guard = self.0.lock().await;
        Ok(guard.get(session_id).map(|r| SessionRecord {
            state: r.state.clone(),
            created_at: r.created_at,
            expires_at: r.expires_at,
        }))
    }

    /// Deletes a session record from the store using the provided ID.
    #[tracing::instrument(name = "Delete server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn delete(&self, id: &SessionId) -> Result<(), DeleteError> {
        let mut guard = self.0.lock().await;
        match guard.remove(id) {
            Some(_) => Ok(()),
            None => Err(UnknownIdError { id: id.clone() }.into()),
        }
    }

    #[tracing::instrument(name = "Delete records expiring after cutoff", level = tracing::Level::TRACE, skip_all)]
    async fn delete_expiring_since(&self, cutoff: Timestamp) -> Result<usize, BulkDeleteError> {
        Ok(self.retain(|_, r| r.expires_at < cutoff).await)
    }

    #[tracing::instrument(name = "Delete expired records", level = tracing::Level::TRACE, skip_all)]
    async fn delete_expired(&self, now: Timestamp) -> Result<usize, BulkDeleteError> {
        Ok(self.retain(|_, r| r.expires_at >= now).await)
    }

    #[tracing::instrument(name = "Delete all records", level = tracing::Level::TRACE, skip_all)]
    async fn delete_all(&self) -> Result<usize, BulkDeleteError> {
        Ok(self.retain(|_, _| false).await)
    }

    #[tracing::instrument(name = "Delete records by id", level = tracing::Level::TRACE, skip_all)]
    async fn delete_many(&self, ids: &[SessionId]) -> Result<usize, BulkDeleteError> {
        Ok(self.retain(|id, _| !ids.contains(id)).await)
    }
}
