use std::{borrow::Cow, sync::Arc};

use indexmap::IndexMap;
use jiff::{Timestamp, ToSpan};
use tokio::sync::Mutex;
use unsafe_session::{
    IncomingSession, SessionConfig, SessionId, SessionStore,
    config::CookieSigningConfig,
    store::{
        SessionRecord, SessionRecordRef, SessionStorageBackend,
        errors::{
            BulkDeleteError, CreateError, DeleteError, LoadError, UpdateError, UpdateExpiryError,
        },
    },
};
use unsafe_session_memory_store::InMemorySessionStore;

/// An empty in-memory session store.
pub fn store() -> SessionStore {
    let backend = InMemorySessionStore::default();
    SessionStore::new(backend)
}

/// An empty in-memory session store, with a mechanism to inspect
/// what calls were made to it.
pub fn spy_store() -> (SessionStore, CallTracker) {
    let backend = InMemorySessionStore::default();
    let spy_backend = SpyBackend::new(backend);
    let call_tracker = spy_backend.call_tracker();
    (SessionStore::new(spy_backend), call_tracker)
}

/// The default configuration, with cookie signing enabled.
pub fn signed_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.signing = CookieSigningConfig::default().with_secret("secret");
    config
}

/// The current time, truncated to whole seconds.
pub fn now() -> Timestamp {
    Timestamp::from_second(Timestamp::now().as_second()).unwrap()
}

/// A helper to set up a pre-existing session.
pub struct SessionFixture {
    pub id: SessionId,
    /// If `None`, no server-side record will be created.
    pub state: Option<IndexMap<String, serde_json::Value>>,
    pub created_at: Timestamp,
    /// If `None`, it'll be defaulted to a value that's far enough in the future
    /// to avoid expiration while we run the test suite.
    pub expires_at: Option<Timestamp>,
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self {
            id: SessionId::random(),
            state: Some(IndexMap::new()),
            created_at: now() - 1.hour(),
            expires_at: None,
        }
    }
}

impl SessionFixture {
    /// A fixture with a record holding the given state.
    pub fn with_state<const N: usize>(entries: [(&str, serde_json::Value); N]) -> Self {
        Self {
            state: Some(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    /// Perform the required setup operations and return the `IncomingSession`
    /// instance you need to perform your tests.
    pub async fn setup(&self, store: &SessionStore) -> IncomingSession {
        if let Some(state) = &self.state {
            let expires_at = self.expires_at.unwrap_or_else(|| now() + 1.hour());
            store
                .create(
                    &self.id,
                    SessionRecordRef {
                        state: Cow::Borrowed(state),
                        created_at: self.created_at,
                        expires_at,
                    },
                )
                .await
                .expect("Failed to create the session record for the fixture");
        }

        IncomingSession::from_id(self.id.clone())
    }

    pub fn id(&self) -> &str {
        self.id.inner()
    }
}

/// A wrapper that keeps track of which methods have been called
/// on the underlying session storage backend
#[derive(Debug)]
pub struct SpyBackend<B> {
    backend: B,
    call_tracker: CallTracker,
}

impl<B> SpyBackend<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            call_tracker: Default::default(),
        }
    }

    pub fn call_tracker(&self) -> CallTracker {
        self.call_tracker.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallTracker(Arc<Mutex<Vec<String>>>);

impl CallTracker {
    pub async fn assert_store_was_untouched(&self) {
        let oplog = self.0.lock().await;
        assert!(
            oplog.is_empty(),
            "Server store was supposed to be untouched, but at least one method has been called on it. Operation log:\n  - {}",
            oplog.join("\n  - ")
        )
    }

    pub async fn operation_log(&self) -> Vec<String> {
        self.0.lock().await.clone()
    }

    /// Forget all the operations recorded so far.
    pub async fn reset(&self) {
        self.0.lock().await.clear();
    }

    async fn push_operation(&self, op: impl Into<String>) {
        self.0.lock().await.push(op.into());
    }
}

#[async_trait::async_trait]
impl<B: SessionStorageBackend> SessionStorageBackend for SpyBackend<B> {
    async fn create(
        &self,
        id: &SessionId,
        record: SessionRecordRef<'_>,
    ) -> Result<(), CreateError> {
        self.call_tracker
            .push_operation(format!("create {id}"))
            .await;
        self.backend.create(id, record).await
    }

    async fn update(
        &self,
        id: &SessionId,
        record: SessionRecordRef<'_>,
    ) -> Result<(), UpdateError> {
        self.call_tracker
            .push_operation(format!("update {id}"))
            .await;
        self.backend.update(id, record).await
    }

    async fn update_expiry(
        &self,
        id: &SessionId,
        expires_at: Timestamp,
    ) -> Result<(), UpdateExpiryError> {
        self.call_tracker
            .push_operation(format!("update-expiry {id}"))
            .await;
        self.backend.update_expiry(id, expires_at).await
    }

    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, LoadError> {
        self.call_tracker
            .push_operation(format!("load {session_id}"))
            .await;
        self.backend.load(session_id).await
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), DeleteError> {
        self.call_tracker
            .push_operation(format!("delete {session_id}"))
            .await;
        self.backend.delete(session_id).await
    }

    async fn delete_expiring_since(&self, cutoff: Timestamp) -> Result<usize, BulkDeleteError> {
        self.call_tracker
            .push_operation(format!("delete-expiring-since {}", cutoff.as_second()))
            .await;
        self.backend.delete_expiring_since(cutoff).await
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<usize, BulkDeleteError> {
        self.call_tracker
            .push_operation(format!("delete-expired {}", now.as_second()))
            .await;
        self.backend.delete_expired(now).await
    }

    async fn delete_all(&self) -> Result<usize, BulkDeleteError> {
        self.call_tracker.push_operation("delete-all").await;
        self.backend.delete_all().await
    }

    async fn delete_many(&self, ids: &[SessionId]) -> Result<usize, BulkDeleteError> {
        self.call_tracker
            .push_operation(format!("delete-many {}", ids.len()))
            .await;
        self.backend.delete_many(ids).await
    }
}
