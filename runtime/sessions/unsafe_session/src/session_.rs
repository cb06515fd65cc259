use crate::SessionConfig;
use crate::SessionId;
use crate::SessionStore;
use crate::config::SessionCookieKind;
use crate::incoming::IncomingSession;
use crate::store::SessionRecordRef;
use crate::store::errors::{DeleteError, LoadError, UpdateError, UpdateExpiryError};
use crate::store_::now;
use biscotti::ResponseCookie;
use errors::{
    FinalizeError, GetError, InsertError, InvalidateError, ValueDeserializationError,
    ValueSerializationError,
};
use indexmap::IndexMap;
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use unsafe_tracing::fields::{
    ERROR_DETAILS, ERROR_MESSAGE, SESSION_ID, error_details, error_message, session_id,
};

#[derive(Debug)]
/// The current HTTP session.
///
/// It behaves like an insertion-ordered map from string keys to JSON values,
/// backed by a record in the [`SessionStore`].
///
/// # Lazy loading
///
/// The record is not fetched when the session is created: it's loaded on the
/// first read or write. A request that never touches the session never hits
/// the store.
///
/// # Change tracking
///
/// Reads mark the session as accessed, writes mark it as dirty.
/// [`Session::finalize`] uses those flags to decide what to persist:
///
/// - A dirty new session is inserted and a session cookie is issued.
/// - A dirty existing session is updated, with a fresh expiry.
/// - An accessed existing session only gets a fresh expiry.
///
/// If you mutate a value obtained via [`Session::get_raw_mut`] after the call
/// returned, the session is already dirty. If you mutate it through other means,
/// call [`Session::changed`].
pub struct Session<'store> {
    id: Option<SessionId>,
    state: IndexMap<String, Value>,
    created_at: Option<Timestamp>,
    is_new: bool,
    is_dirty: bool,
    is_loaded: bool,
    was_accessed: bool,
    reset_cookie: bool,
    store: &'store SessionStore,
    config: &'store SessionConfig,
}

impl<'store> Session<'store> {
    /// Create a new HTTP session.
    ///
    /// It is a continuation of the existing session if there was a valid session id
    /// attached to the request.
    /// It is a brand-new session otherwise.
    pub fn new(
        store: &'store SessionStore,
        config: &'store SessionConfig,
        incoming_session: Option<IncomingSession>,
    ) -> Self {
        let id = incoming_session.map(|s| s.id);
        let is_new = id.is_none();
        Self {
            id,
            state: IndexMap::new(),
            created_at: None,
            is_new,
            is_dirty: false,
            is_loaded: is_new,
            was_accessed: false,
            reset_cookie: false,
            store,
            config,
        }
    }

    /// The id of the current session, if it has one.
    ///
    /// A new session gets its id when it's first persisted, in [`Session::finalize`].
    /// It doesn't trigger a load.
    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    /// `true` if the session state changed since it was loaded.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// `true` if the session state was read or written.
    pub fn was_accessed(&self) -> bool {
        self.was_accessed
    }

    /// `true` if there's nothing left to fetch from the store.
    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    /// `true` if there is no record for this session in the store yet.
    ///
    /// It loads the session, since a session id sent by the client may point
    /// to a record that no longer exists.
    pub async fn is_new(&mut self) -> Result<bool, LoadError> {
        self.force_load().await?;
        Ok(self.is_new)
    }

    /// When the session was created.
    ///
    /// For sessions that haven't been persisted yet, the creation time is
    /// set to now on the first call.
    pub async fn created_at(&mut self) -> Result<Timestamp, LoadError> {
        self.force_load().await?;
        Ok(*self.created_at.get_or_insert_with(now))
    }

    /// Get the value associated with `key`.
    ///
    /// If the value is not found, `None` is returned.
    /// If the value cannot be deserialized into the expected type, an error is returned.
    pub async fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, GetError> {
        self.get_raw(key)
            .await?
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(|e| {
                ValueDeserializationError {
                    key: key.to_owned(),
                    source: e,
                }
                .into()
            })
    }

    /// Get the raw JSON value associated with `key`.
    pub async fn get_raw(&mut self, key: &str) -> Result<Option<&Value>, LoadError> {
        self.accessed().await?;
        Ok(self.state.get(key))
    }

    /// `true` if there is a value associated with `key`.
    pub async fn contains_key(&mut self, key: &str) -> Result<bool, LoadError> {
        self.accessed().await?;
        Ok(self.state.contains_key(key))
    }

    /// The keys in the session state, in insertion order.
    pub async fn keys(&mut self) -> Result<impl Iterator<Item = &str>, LoadError> {
        self.accessed().await?;
        Ok(self.state.keys().map(String::as_str))
    }

    /// A read-only view over the whole session state.
    pub async fn state(&mut self) -> Result<&IndexMap<String, Value>, LoadError> {
        self.accessed().await?;
        Ok(&self.state)
    }

    /// The number of key-value pairs in the session state.
    pub async fn len(&mut self) -> Result<usize, LoadError> {
        self.accessed().await?;
        Ok(self.state.len())
    }

    /// `true` if the session state holds no values.
    pub async fn is_empty(&mut self) -> Result<bool, LoadError> {
        self.accessed().await?;
        Ok(self.state.is_empty())
    }

    /// Set a value for the given key.
    ///
    /// If the key already exists, the old raw value is returned.
    /// If the value cannot be serialized, an error is returned and the
    /// session is left untouched.
    pub async fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>, InsertError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| ValueSerializationError {
            key: key.clone(),
            source: e,
        })?;
        self.insert_raw(key, value).await.map_err(Into::into)
    }

    /// Set a raw JSON value for the given key.
    ///
    /// If the key already exists, the old value is returned.
    pub async fn insert_raw(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, LoadError> {
        self.changed().await?;
        Ok(self.state.insert(key.into(), value))
    }

    /// Remove the value associated with `key`.
    ///
    /// The relative order of the remaining keys is preserved.
    pub async fn remove(&mut self, key: &str) -> Result<Option<Value>, LoadError> {
        self.changed().await?;
        Ok(self.state.shift_remove(key))
    }

    /// Remove all key-value pairs.
    ///
    /// The session record is kept: use [`Session::invalidate`] to delete it.
    pub async fn clear(&mut self) -> Result<(), LoadError> {
        self.changed().await?;
        self.state.clear();
        Ok(())
    }

    /// Insert all the key-value pairs yielded by `entries`.
    pub async fn extend<I, K>(&mut self, entries: I) -> Result<(), LoadError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.changed().await?;
        self.state
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        Ok(())
    }

    /// Get a mutable reference to the raw value associated with `key`.
    ///
    /// The session is marked as changed, whether you end up mutating the value or not.
    pub async fn get_raw_mut(&mut self, key: &str) -> Result<Option<&mut Value>, LoadError> {
        self.changed().await?;
        Ok(self.state.get_mut(key))
    }

    /// Mark the session as changed, so that it's written back to the store.
    ///
    /// It's idempotent.
    pub async fn changed(&mut self) -> Result<(), LoadError> {
        self.force_load().await?;
        if !self.is_dirty {
            self.was_accessed = true;
            self.is_dirty = true;
            if self.created_at.is_none() {
                self.created_at = Some(now());
            }
        }
        Ok(())
    }

    /// Invalidate the session.
    ///
    /// The session record is deleted from the store and the in-memory state is
    /// cleared. The session cookie will be cleared on the client, unless the session
    /// is written to again: in that case, it's stored under a brand-new id.
    ///
    /// Call it when the privilege level changes (e.g. on login and logout) to
    /// prevent session fixation.
    pub async fn invalidate(&mut self) -> Result<(), InvalidateError> {
        self.delete_record().await?;
        self.reset();
        Ok(())
    }

    /// Sync the session with the store and compute the cookie to send back, if any.
    ///
    /// In most cases, you don't need to invoke this method manually: it is
    /// done for you by [`finalize_session`][`super::finalize_session`],
    /// which attaches the cookie to the outgoing response.
    pub async fn finalize(&mut self) -> Result<Option<ResponseCookie<'static>>, FinalizeError> {
        let timeout = self.config.state.timeout;
        if self.is_dirty {
            let now = now();
            let record = SessionRecordRef {
                state: Cow::Borrowed(&self.state),
                created_at: self.created_at.unwrap_or(now),
                expires_at: expiry(now, timeout),
            };
            if self.is_new {
                let id = self.id.get_or_insert_with(SessionId::random);
                self.store.create(id, record).await?;
                let value = self.config.codec().encode(id);
                self.is_new = false;
                self.is_dirty = false;
                return Ok(Some(self.session_cookie(value)));
            }
            if let Some(id) = &self.id {
                match self.store.update(id, record).await {
                    Ok(()) => {}
                    Err(UpdateError::UnknownId(e)) => {
                        tracing::event!(
                            tracing::Level::WARN,
                            { SESSION_ID } = session_id(id),
                            { ERROR_MESSAGE } = error_message(&e),
                            { ERROR_DETAILS } = error_details(&e),
                            "The session record disappeared before it could be updated"
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            self.is_dirty = false;
            return Ok(None);
        }

        if self.reset_cookie {
            return Ok(Some(self.removal_cookie()));
        }

        if self.was_accessed && !self.is_new {
            if let Some(id) = &self.id {
                match self.store.update_expiry(id, expiry(now(), timeout)).await {
                    Ok(()) => {}
                    Err(UpdateExpiryError::UnknownId(e)) => {
                        tracing::event!(
                            tracing::Level::WARN,
                            { SESSION_ID } = session_id(id),
                            { ERROR_MESSAGE } = error_message(&e),
                            { ERROR_DETAILS } = error_details(&e),
                            "The session record disappeared before its expiry could be extended"
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(None)
    }

    async fn accessed(&mut self) -> Result<(), LoadError> {
        if !self.was_accessed {
            self.force_load().await?;
            self.was_accessed = true;
        }
        Ok(())
    }

    /// Load the session record from the store.
    /// This method does nothing if the record has already been loaded.
    async fn force_load(&mut self) -> Result<(), LoadError> {
        if self.is_loaded {
            return Ok(());
        }
        self.is_loaded = true;
        let Some(id) = self.id.clone() else {
            return Ok(());
        };
        let record = self.store.load(&id).await?;
        let now = now();
        match record {
            Some(record) if !record.is_expired(now) => {
                self.created_at = Some(record.created_at);
                self.reset_cookie = false;
                self.state.extend(record.state);
            }
            record => {
                if self.config.insecure.accept_client_session_id {
                    tracing::debug!(
                        { SESSION_ID } = session_id(&id),
                        "Adopting a session id that doesn't match a valid record"
                    );
                    self.created_at = Some(now);
                    self.is_new = record.is_none();
                    self.reset_cookie = false;
                } else {
                    tracing::debug!(
                        { SESSION_ID } = session_id(&id),
                        "The session record is missing or expired, starting a new session"
                    );
                    self.delete_record()
                        .await
                        .map_err(|e| LoadError::Other(e.into()))?;
                    self.reset();
                }
            }
        }
        Ok(())
    }

    /// Delete the record for the current id, if there is one.
    ///
    /// The client's cookie will be cleared unless the session is written to again.
    async fn delete_record(&mut self) -> Result<(), DeleteError> {
        let Some(id) = self.id.take() else {
            return Ok(());
        };
        match self.store.delete(&id).await {
            Ok(()) | Err(DeleteError::UnknownId(_)) => {}
            Err(e) => {
                self.id = Some(id);
                return Err(e);
            }
        }
        self.reset_cookie = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.state.clear();
        self.was_accessed = false;
        self.is_dirty = false;
        self.created_at = None;
        self.is_loaded = true;
        self.is_new = true;
    }

    fn session_cookie(&self, value: String) -> ResponseCookie<'static> {
        let mut cookie = self.base_cookie(value);
        if self.config.cookie.kind == SessionCookieKind::Persistent {
            let max_age = SignedDuration::try_from(self.config.state.timeout)
                .unwrap_or(SignedDuration::MAX);
            cookie = cookie.set_max_age(max_age);
        }
        cookie
    }

    /// An empty cookie with `Max-Age=0`, telling the client to drop the session cookie.
    fn removal_cookie(&self) -> ResponseCookie<'static> {
        self.base_cookie(String::new())
            .set_max_age(SignedDuration::ZERO)
    }

    fn base_cookie(&self, value: String) -> ResponseCookie<'static> {
        let cookie_config = &self.config.cookie;
        let mut cookie = ResponseCookie::new(cookie_config.name.clone(), value);
        if let Some(domain) = cookie_config.domain.as_deref() {
            cookie = cookie.set_domain(domain.to_owned());
        }
        if let Some(path) = cookie_config.path.as_deref() {
            cookie = cookie.set_path(path.to_owned());
        }
        if let Some(same_site) = cookie_config.same_site {
            cookie = cookie.set_same_site(same_site);
        }
        if cookie_config.secure {
            cookie = cookie.set_secure(true);
        }
        if cookie_config.http_only {
            cookie = cookie.set_http_only(true);
        }
        cookie
    }
}

fn expiry(now: Timestamp, timeout: std::time::Duration) -> Timestamp {
    SignedDuration::try_from(timeout)
        .ok()
        .and_then(|timeout| now.checked_add(timeout).ok())
        .unwrap_or(Timestamp::MAX)
}

/// Errors that can occur when interacting with the session state.
pub mod errors {
    use crate::store::errors::{CreateError, DeleteError, LoadError, UpdateError, UpdateExpiryError};

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`Session::get`][super::Session::get].
    pub enum GetError {
        #[error("Failed to load the session record")]
        LoadError(#[from] LoadError),
        #[error(transparent)]
        DeserializationError(#[from] ValueDeserializationError),
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`Session::insert`][super::Session::insert].
    pub enum InsertError {
        #[error("Failed to load the session record")]
        LoadError(#[from] LoadError),
        #[error(transparent)]
        SerializationError(#[from] ValueSerializationError),
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`Session::invalidate`][super::Session::invalidate].
    pub enum InvalidateError {
        #[error("Failed to delete the session record")]
        DeleteError(#[from] DeleteError),
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    #[error("Failed to deserialize the value associated with `{key}`")]
    /// One of the errors returned by [`Session::get`][super::Session::get].
    pub struct ValueDeserializationError {
        /// The key of the value that we failed to deserialize.
        pub key: String,
        #[source]
        /// The underlying deserialization error.
        pub source: serde_json::Error,
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    #[error("Failed to serialize the value associated with `{key}`")]
    /// One of the errors returned by [`Session::insert`][super::Session::insert].
    pub struct ValueSerializationError {
        /// The key of the value that we failed to serialize.
        pub key: String,
        #[source]
        /// The underlying serialization error.
        pub source: serde_json::Error,
    }

    /// The error returned by [`Session::finalize`][super::Session::finalize].
    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    pub enum FinalizeError {
        #[error("Failed to create a new session record")]
        CreateError(#[from] CreateError),
        #[error("Failed to update a session record")]
        UpdateError(#[from] UpdateError),
        #[error("Failed to update the expiry of a session record")]
        UpdateExpiryError(#[from] UpdateExpiryError),
    }
}
