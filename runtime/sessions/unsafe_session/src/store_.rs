use crate::SessionId;
use errors::{
    BulkDeleteError, CreateError, DeleteError, ExpireError, InvalidCutoffError, LoadError,
    UpdateError, UpdateExpiryError,
};
use indexmap::IndexMap;
use jiff::Timestamp;
use jiff::civil::{Date, DateTime};
use jiff::tz::TimeZone;
use serde_json::Value;
use std::borrow::Cow;
use std::str::FromStr;
use unsafe_tracing::fields::{SESSION_COUNT, session_count};

/// Where server-side session records are stored.
///
/// It is a thin wrapper
/// [around your chosen storage backend implementation][`SessionStorageBackend`],
/// removing the need to specify the concrete type of the storage backend
/// everywhere in your code.
///
/// On top of the per-session operations used by [`Session`](crate::Session),
/// it exposes the administrative bulk operations meant for cleanup jobs
/// running outside of the request path.
#[derive(Debug)]
pub struct SessionStore(Box<dyn SessionStorageBackend>);

impl SessionStore {
    /// Creates a new session store using the provided backend.
    pub fn new<Backend>(backend: Backend) -> Self
    where
        Backend: SessionStorageBackend + 'static,
    {
        Self(Box::new(backend))
    }

    /// Creates a new session record in the store using the provided ID.
    pub async fn create(
        &self,
        id: &SessionId,
        record: SessionRecordRef<'_>,
    ) -> Result<(), CreateError> {
        self.0.create(id, record).await
    }

    /// Overwrite the state and the expiry of an existing session record.
    ///
    /// The creation time is left unchanged.
    pub async fn update(
        &self,
        id: &SessionId,
        record: SessionRecordRef<'_>,
    ) -> Result<(), UpdateError> {
        self.0.update(id, record).await
    }

    /// Move the expiry of an existing session record.
    ///
    /// It leaves the session state unchanged.
    pub async fn update_expiry(
        &self,
        id: &SessionId,
        expires_at: Timestamp,
    ) -> Result<(), UpdateExpiryError> {
        self.0.update_expiry(id, expires_at).await
    }

    /// Loads the session record associated with the provided ID, if there is one.
    ///
    /// Expired records are returned too: it's up to the caller to check
    /// [`SessionRecord::is_expired`].
    pub async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, LoadError> {
        self.0.load(id).await
    }

    /// Deletes a session record from the store using the provided ID.
    pub async fn delete(&self, id: &SessionId) -> Result<(), DeleteError> {
        self.0.delete(id).await
    }

    /// Delete all session records expiring **at or after** the given cutoff.
    ///
    /// It forcibly expires sessions that would otherwise still be valid at
    /// `cutoff`, e.g. to fast-forward time when testing or to log everybody out
    /// after a given point in time.
    /// It returns the number of deleted records.
    #[tracing::instrument(name = "Expire session records", level = tracing::Level::INFO, skip_all, fields(session.cutoff = ?cutoff))]
    pub async fn expire(&self, cutoff: &ExpiryCutoff) -> Result<usize, ExpireError> {
        let cutoff = cutoff.resolve()?;
        let count = self.0.delete_expiring_since(cutoff).await?;
        tracing::info!({ SESSION_COUNT } = session_count(count), "Expired session records");
        Ok(count)
    }

    /// Delete all session records, regardless of their expiry.
    ///
    /// It returns the number of deleted records.
    #[tracing::instrument(name = "Purge all session records", level = tracing::Level::INFO, skip_all)]
    pub async fn purge_all(&self) -> Result<usize, BulkDeleteError> {
        let count = self.0.delete_all().await?;
        tracing::info!({ SESSION_COUNT } = session_count(count), "Purged session records");
        Ok(count)
    }

    /// Delete all session records that have **not** expired yet.
    ///
    /// Expired records are left untouched.
    /// It returns the number of deleted records.
    #[tracing::instrument(name = "Purge unexpired session records", level = tracing::Level::INFO, skip_all)]
    pub async fn purge_unexpired(&self) -> Result<usize, BulkDeleteError> {
        let count = self.0.delete_expiring_since(now()).await?;
        tracing::info!({ SESSION_COUNT } = session_count(count), "Purged unexpired session records");
        Ok(count)
    }

    /// Delete all session records that have expired.
    ///
    /// It returns the number of deleted records.
    #[tracing::instrument(name = "Delete expired session records", level = tracing::Level::INFO, skip_all)]
    pub async fn delete_expired(&self) -> Result<usize, BulkDeleteError> {
        let count = self.0.delete_expired(now()).await?;
        tracing::info!({ SESSION_COUNT } = session_count(count), "Deleted expired session records");
        Ok(count)
    }

    /// Delete the session records associated with the given ids.
    ///
    /// Unknown ids are ignored.
    /// It returns the number of deleted records.
    #[tracing::instrument(name = "Remove session records", level = tracing::Level::INFO, skip_all)]
    pub async fn remove(&self, ids: &[SessionId]) -> Result<usize, BulkDeleteError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let count = self.0.delete_many(ids).await?;
        tracing::info!({ SESSION_COUNT } = session_count(count), "Removed session records");
        Ok(count)
    }
}

#[async_trait::async_trait]
/// The interface of a session storage backend.
pub trait SessionStorageBackend: std::fmt::Debug + Send + Sync {
    /// Creates a new session record in the store using the provided ID.
    ///
    /// It must fail with [`CreateError::DuplicateId`] if a record with the
    /// same ID already exists.
    async fn create(&self, id: &SessionId, record: SessionRecordRef<'_>)
    -> Result<(), CreateError>;

    /// Overwrite the state and the expiry of an existing session record.
    ///
    /// The creation time of the existing record must be preserved.
    async fn update(&self, id: &SessionId, record: SessionRecordRef<'_>)
    -> Result<(), UpdateError>;

    /// Move the expiry of an existing session record.
    ///
    /// It leaves the session state unchanged.
    async fn update_expiry(
        &self,
        id: &SessionId,
        expires_at: Timestamp,
    ) -> Result<(), UpdateExpiryError>;

    /// Loads the session record associated with the provided ID.
    ///
    /// Expired records must be returned as well, since the session decides
    /// what to do with them.
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, LoadError>;

    /// Deletes a session record from the store using the provided ID.
    ///
    /// It must fail with [`DeleteError::UnknownId`] if there is no such record.
    async fn delete(&self, session_id: &SessionId) -> Result<(), DeleteError>;

    /// Delete all records whose expiry is at or after `cutoff`.
    async fn delete_expiring_since(&self, cutoff: Timestamp) -> Result<usize, BulkDeleteError>;

    /// Delete all records whose expiry is strictly before `now`.
    async fn delete_expired(&self, now: Timestamp) -> Result<usize, BulkDeleteError>;

    /// Delete all records.
    async fn delete_all(&self) -> Result<usize, BulkDeleteError>;

    /// Delete the records associated with the given ids.
    async fn delete_many(&self, ids: &[SessionId]) -> Result<usize, BulkDeleteError>;
}

/// A server-side session record that's going to be stored in the
/// chosen storage backend.
#[derive(Debug)]
pub struct SessionRecordRef<'session> {
    /// The set of key-value pairs attached to a session.
    pub state: Cow<'session, IndexMap<String, Value>>,
    /// When the session was first written.
    pub created_at: Timestamp,
    /// When the session expires.
    pub expires_at: Timestamp,
}

/// A server-side session record that was retrieved from the
/// chosen storage backend.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// The set of key-value pairs attached to a session.
    pub state: IndexMap<String, Value>,
    /// When the session was first written.
    pub created_at: Timestamp,
    /// When the session expires.
    pub expires_at: Timestamp,
}

impl SessionRecord {
    /// A record is valid strictly before its expiry: it's already expired
    /// when `now == expires_at`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
/// The point in time used by [`SessionStore::expire`].
///
/// Calendar dates and date-times are interpreted in the system's local time zone.
pub enum ExpiryCutoff {
    /// The current time.
    Now,
    /// An absolute point in time.
    At(Timestamp),
    /// Midnight, local time, at the start of the given day.
    Date(Date),
    /// The given wall-clock time, local time.
    DateTime(DateTime),
}

impl ExpiryCutoff {
    /// Build a cutoff from the number of seconds since the Unix epoch.
    pub fn from_epoch_seconds(seconds: i64) -> Result<Self, InvalidCutoffError> {
        Timestamp::from_second(seconds)
            .map(Self::At)
            .map_err(|e| InvalidCutoffError {
                input: seconds.to_string(),
                source: Some(e),
            })
    }

    /// Convert the cutoff into an absolute point in time, truncated to whole seconds.
    pub fn resolve(&self) -> Result<Timestamp, InvalidCutoffError> {
        let local = |r: Result<jiff::Zoned, jiff::Error>| {
            r.map(|z| z.timestamp()).map_err(|e| InvalidCutoffError {
                input: self.to_string(),
                source: Some(e),
            })
        };
        let resolved = match self {
            ExpiryCutoff::Now => now(),
            ExpiryCutoff::At(t) => *t,
            ExpiryCutoff::Date(d) => local(d.to_zoned(TimeZone::system()))?,
            ExpiryCutoff::DateTime(dt) => local(dt.to_zoned(TimeZone::system()))?,
        };
        Ok(truncate_to_seconds(resolved))
    }
}

impl std::fmt::Display for ExpiryCutoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpiryCutoff::Now => f.write_str("now"),
            ExpiryCutoff::At(t) => write!(f, "{t}"),
            ExpiryCutoff::Date(d) => write!(f, "{d}"),
            ExpiryCutoff::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

impl FromStr for ExpiryCutoff {
    type Err = InvalidCutoffError;

    /// Accepted formats, in order:
    ///
    /// - `now`
    /// - an RFC 3339 timestamp, with offset (e.g. `2024-03-01T10:00:00Z`)
    /// - an ISO 8601 date (e.g. `2024-03-01`)
    /// - an ISO 8601 date-time, without offset (e.g. `2024-03-01T10:00:00`)
    /// - an integer number of seconds since the Unix epoch
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("now") {
            return Ok(Self::Now);
        }
        if let Ok(t) = s.parse::<Timestamp>() {
            return Ok(Self::At(t));
        }
        // A date parser would accept a date-time too, dropping the time of day.
        if s.contains(['T', 't', ' ']) {
            if let Ok(dt) = s.parse::<DateTime>() {
                return Ok(Self::DateTime(dt));
            }
        } else if let Ok(d) = s.parse::<Date>() {
            return Ok(Self::Date(d));
        }
        if let Ok(seconds) = s.parse::<i64>() {
            return Self::from_epoch_seconds(seconds);
        }
        Err(InvalidCutoffError {
            input: s.to_owned(),
            source: None,
        })
    }
}

/// The current time, truncated to whole seconds.
///
/// Session timestamps are persisted as seconds since the Unix epoch: every
/// comparison against them must use the same resolution.
pub(crate) fn now() -> Timestamp {
    truncate_to_seconds(Timestamp::now())
}

fn truncate_to_seconds(t: Timestamp) -> Timestamp {
    Timestamp::from_second(t.as_second()).unwrap_or(t)
}

impl From<Timestamp> for ExpiryCutoff {
    fn from(value: Timestamp) -> Self {
        Self::At(value)
    }
}

impl From<Date> for ExpiryCutoff {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

impl From<DateTime> for ExpiryCutoff {
    fn from(value: DateTime) -> Self {
        Self::DateTime(value)
    }
}

/// Errors that can occur when interacting with a session storage backend.
pub mod errors {
    use crate::SessionId;

    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by [`SessionStorageBackend::create`][super::SessionStorageBackend::create].
    pub enum CreateError {
        /// Failed to serialize the session state.
        #[error("Failed to serialize the session state.")]
        SerializationError(#[from] serde_json::Error),
        #[error(transparent)]
        /// A session with the same ID already exists.
        DuplicateId(#[from] DuplicateIdError),
        /// Something else went wrong when creating a new session record.
        #[error("Something went wrong when creating a new session record.")]
        Other(#[source] anyhow::Error),
    }

    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by [`SessionStorageBackend::update`][super::SessionStorageBackend::update].
    pub enum UpdateError {
        #[error("Failed to serialize the session state.")]
        /// Failed to serialize the session state.
        SerializationError(#[from] serde_json::Error),
        #[error(transparent)]
        /// There is no session with the given ID.
        UnknownId(#[from] UnknownIdError),
        /// Something else went wrong when updating the session record.
        #[error("Something went wrong when updating the session record.")]
        Other(#[source] anyhow::Error),
    }

    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by [`SessionStorageBackend::update_expiry`][super::SessionStorageBackend::update_expiry].
    pub enum UpdateExpiryError {
        #[error(transparent)]
        /// There is no session with the given ID.
        UnknownId(#[from] UnknownIdError),
        /// Something else went wrong when updating the session record.
        #[error("Something went wrong when updating the expiry of the session record.")]
        Other(#[source] anyhow::Error),
    }

    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by [`SessionStorageBackend::load`][super::SessionStorageBackend::load].
    pub enum LoadError {
        #[error("Failed to deserialize the session state.")]
        /// Failed to deserialize the session state.
        DeserializationError(#[source] anyhow::Error),
        /// Something else went wrong when loading the session record.
        #[error("Something went wrong when loading the session record.")]
        Other(#[source] anyhow::Error),
    }

    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by [`SessionStorageBackend::delete`][super::SessionStorageBackend::delete].
    pub enum DeleteError {
        #[error(transparent)]
        /// There is no session with the given ID.
        UnknownId(#[from] UnknownIdError),
        /// Something else went wrong when deleting the session record.
        #[error("Something went wrong when deleting the session record.")]
        Other(#[source] anyhow::Error),
    }

    #[derive(Debug, thiserror::Error)]
    #[error("Something went wrong when deleting session records in bulk.")]
    /// The error returned by the bulk deletion methods on
    /// [`SessionStorageBackend`][super::SessionStorageBackend].
    pub struct BulkDeleteError(#[from] pub anyhow::Error);

    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by [`SessionStore::expire`][super::SessionStore::expire].
    pub enum ExpireError {
        #[error(transparent)]
        /// The cutoff couldn't be converted into a point in time.
        InvalidCutoff(#[from] InvalidCutoffError),
        #[error(transparent)]
        /// The storage backend failed to delete the records.
        Storage(#[from] BulkDeleteError),
    }

    #[derive(Debug, thiserror::Error)]
    #[error(
        "`{input}` is not a valid expiry cutoff. Expected `now`, a number of seconds since \
        the Unix epoch, or an ISO 8601 date, date-time or timestamp"
    )]
    /// The value provided as an expiry cutoff can't be interpreted as a point in time.
    ///
    /// This signals a mistake on the caller side, not a storage failure.
    pub struct InvalidCutoffError {
        /// The rejected input.
        pub input: String,
        #[source]
        /// The underlying conversion error, if any.
        pub source: Option<jiff::Error>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("There is no session with the given id")]
    /// There is no session with the given ID.
    pub struct UnknownIdError {
        pub id: SessionId,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("A session with the same ID already exists.")]
    /// A session with the same ID already exists.
    pub struct DuplicateIdError {
        pub id: SessionId,
    }
}
