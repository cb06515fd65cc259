//! Types related to [`SqliteSessionStore`].

use anyhow::Context as _;
use indexmap::IndexMap;
use jiff::Timestamp;
use sqlx::{
    SqlitePool,
    error::DatabaseError,
    sqlite::{SqliteError, SqliteQueryResult},
};
use unsafe_session::SessionStore;
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

#[derive(Debug, Clone)]
/// Session records kept in a SQLite database.
///
/// Records live in the `session_store` table, one row per session id.
/// The state is a JSON object in the `userdata` column; `created_at` and
/// `expires_at` are seconds since the Unix epoch.
///
/// Call [`migrate`](Self::migrate) once at startup to create the table, or run
/// [`migration_query`](Self::migration_query) with your own migration tooling.
pub struct SqliteSessionStore(sqlx::SqlitePool);

impl From<SqliteSessionStore> for SessionStore {
    fn from(value: SqliteSessionStore) -> Self {
        SessionStore::new(value)
    }
}

impl SqliteSessionStore {
    /// Wrap a pool of connections to the database holding `session_store`.
    pub fn new(pool: SqlitePool) -> Self {
        Self(pool)
    }

    /// The SQL that creates `session_store` and its index on `expires_at`.
    ///
    /// Running it against an initialised database is a no-op.
    pub fn migration_query() -> &'static str {
        "CREATE TABLE IF NOT EXISTS session_store (
    session_id TEXT PRIMARY KEY,
    expires_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    userdata TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_store_expires_at ON session_store(expires_at);"
    }

    /// Execute [`migration_query`](Self::migration_query).
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        use sqlx::Executor as _;

        self.0.execute(Self::migration_query()).await?;
        Ok(())
    }

    /// Drop the sessions table, if it exists.
    ///
    /// Every session record is lost.
    pub async fn reset(&self) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS session_store")
            .execute(&self.0)
            .await?;
        Ok(())
    }

    /// The pool used by this store.
    pub fn pool(&self) -> &SqlitePool {
        &self.0
    }
}

#[async_trait::async_trait]
impl SessionStorageBackend for SqliteSessionStore {
    /// Creates a new session record in the store using the provided ID.
    #[tracing::instrument(name = "Create server-side session record", level = tracing::Level::INFO, skip_all)]
    async fn create(
        &self,
        id: &SessionId,
        record: SessionRecordRef<'_>,
    ) -> Result<(), CreateError> {
        let userdata = serde_json::to_string(&*record.state)?;
        let query = sqlx::query(
            "INSERT INTO session_store (session_id, expires_at, created_at, userdata) \
            VALUES (?, ?, ?, ?)",
        )
        .bind(id.inner())
        .bind(record.expires_at.as_second())
        .bind(record.created_at.as_second())
        .bind(userdata);

        match query.execute(&self.0).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Err(e) = as_duplicated_id_error(&e, id) {
                    Err(e.into())
                } else {
                    Err(CreateError::Other(e.into()))
                }
            }
        }
    }

    /// Update the state and the expiry of an existing session in the store.
    ///
    /// The creation time is left untouched.
    #[tracing::instrument(name = "Update server-side session record", level = tracing::Level::INFO, skip_all)]
    async fn update(
        &self,
        id: &SessionId,
        record: SessionRecordRef<'_>,
    ) -> Result<(), UpdateError> {
        let userdata = serde_json::to_string(&*record.state)?;
        let query = sqlx::query(
            "UPDATE session_store \
            SET expires_at = ?, userdata = ? \
            WHERE session_id = ?",
        )
        .bind(record.expires_at.as_second())
        .bind(userdata)
        .bind(id.inner());

        match query.execute(&self.0).await {
            Ok(r) => as_unknown_id_error(&r, id).map_err(Into::into),
            Err(e) => Err(UpdateError::Other(e.into())),
        }
    }

    /// Update the expiry of an existing session record in the store.
    ///
    /// It leaves the session state unchanged.
    #[tracing::instrument(name = "Update expiry for server-side session record", level = tracing::Level::INFO, skip_all)]
    async fn update_expiry(
        &self,
        id: &SessionId,
        expires_at: Timestamp,
    ) -> Result<(), UpdateExpiryError> {
        let query = sqlx::query(
            "UPDATE session_store \
            SET expires_at = ? \
            WHERE session_id = ?",
        )
        .bind(expires_at.as_second())
        .bind(id.inner());
        match query.execute(&self.0).await {
            Ok(r) => as_unknown_id_error(&r, id).map_err(Into::into),
            Err(e) => Err(UpdateExpiryError::Other(e.into())),
        }
    }

    /// Loads an existing session record from the store using the provided ID.
    ///
    /// Expired records are returned too.
    #[tracing::instrument(name = "Load server-side session record", level = tracing::Level::INFO, skip_all)]
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, LoadError> {
        let row = sqlx::query(
            "SELECT expires_at, created_at, userdata \
            FROM session_store \
            WHERE session_id = ?",
        )
        .bind(session_id.inner())
        .fetch_optional(&self.0)
        .await
        .map_err(|e| LoadError::Other(e.into()))?;
        row.map(|r| {
            use sqlx::Row as _;

            let expires_at: i64 = r
                .try_get(0)
                .context("Failed to deserialize the retrieved session expiry")
                .map_err(LoadError::DeserializationError)?;
            let created_at: i64 = r
                .try_get(1)
                .context("Failed to deserialize the retrieved session creation time")
                .map_err(LoadError::DeserializationError)?;
            let userdata: String = r
                .try_get(2)
                .context("Failed to deserialize the retrieved session state")
                .map_err(LoadError::DeserializationError)?;
            Ok(SessionRecord {
                expires_at: Timestamp::from_second(expires_at)
                    .context("Failed to parse the retrieved session expiry")
                    .map_err(LoadError::DeserializationError)?,
                created_at: Timestamp::from_second(created_at)
                    .context("Failed to parse the retrieved session creation time")
                    .map_err(LoadError::DeserializationError)?,
                state: serde_json::from_str::<IndexMap<String, serde_json::Value>>(&userdata)
                    .context("Failed to deserialize the retrieved session state")
                    .map_err(LoadError::DeserializationError)?,
            })
        })
        .transpose()
    }

    /// Deletes a session record from the store using the provided ID.
    #[tracing::instrument(name = "Delete server-side session record", level = tracing::Level::INFO, skip_all)]
    async fn delete(&self, id: &SessionId) -> Result<(), DeleteError> {
        let query = sqlx::query("DELETE FROM session_store WHERE session_id = ?").bind(id.inner());
        match query.execute(&self.0).await {
            Ok(r) => as_unknown_id_error(&r, id).map_err(Into::into),
            Err(e) => Err(DeleteError::Other(e.into())),
        }
    }

    /// Delete all sessions expiring at or after `cutoff`.
    #[tracing::instrument(name = "Delete session records expiring after cutoff", level = tracing::Level::INFO, skip_all)]
    async fn delete_expiring_since(&self, cutoff: Timestamp) -> Result<usize, BulkDeleteError> {
        let query = sqlx::query("DELETE FROM session_store WHERE expires_at >= ?")
            .bind(cutoff.as_second());
        bulk_delete(query.execute(&self.0).await)
    }

    /// Delete expired sessions from the database.
    #[tracing::instrument(name = "Delete expired session records", level = tracing::Level::INFO, skip_all)]
    async fn delete_expired(&self, now: Timestamp) -> Result<usize, BulkDeleteError> {
        let query = sqlx::query("DELETE FROM session_store WHERE expires_at < ?")
            .bind(now.as_second());
        bulk_delete(query.execute(&self.0).await)
    }

    /// Delete every session record.
    #[tracing::instrument(name = "Delete all session records", level = tracing::Level::INFO, skip_all)]
    async fn delete_all(&self) -> Result<usize, BulkDeleteError> {
        let query = sqlx::query("DELETE FROM session_store");
        bulk_delete(query.execute(&self.0).await)
    }

    /// Delete the session records with the given ids, in a single transaction.
    #[tracing::instrument(name = "Delete session records by id", level = tracing::Level::INFO, skip_all)]
    async fn delete_many(&self, ids: &[SessionId]) -> Result<usize, BulkDeleteError> {
        let mut transaction = self.0.begin().await.map_err(anyhow::Error::from)?;
        let mut deleted = 0;
        for id in ids {
            let r = sqlx::query("DELETE FROM session_store WHERE session_id = ?")
                .bind(id.inner())
                .execute(&mut *transaction)
                .await
                .map_err(anyhow::Error::from)?;
            deleted += r.rows_affected();
        }
        transaction.commit().await.map_err(anyhow::Error::from)?;
        Ok(deleted.try_into().unwrap_or(usize::MAX))
    }
}

fn bulk_delete(r: Result<SqliteQueryResult, sqlx::Error>) -> Result<usize, BulkDeleteError> {
    let r = r.map_err(anyhow::Error::from)?;
    Ok(r.rows_affected().try_into().unwrap_or(usize::MAX))
}

fn as_duplicated_id_error(e: &sqlx::Error, id: &SessionId) -> Result<(), DuplicateIdError> {
    if let Some(e) = e.as_database_error() {
        if let Some(e) = e.try_downcast_ref::<SqliteError>() {
            // SQLITE_CONSTRAINT_PRIMARYKEY
            if e.code() == Some("1555".into()) {
                return Err(DuplicateIdError { id: id.to_owned() });
            }
        }
    }
    Ok(())
}

fn as_unknown_id_error(r: &SqliteQueryResult, id: &SessionId) -> Result<(), UnknownIdError> {
    if r.rows_affected() == 0 {
        return Err(UnknownIdError { id: id.to_owned() });
    }
    // `session_id` is the primary key.
    debug_assert_eq!(
        r.rows_affected(),
        1,
        "A single session id matched {} rows in `session_store`",
        r.rows_affected()
    );
    Ok(())
}
