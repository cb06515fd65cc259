/*!
A server-side session store, built for teaching web security.

# Why do we need sessions?

HTTP is stateless: every request is processed on its own, using only the
inputs it carries and whatever state the server queries while handling it.
That's not enough to "log in": without a way to attach state to a sequence of
requests, the user would have to send their credentials on every request.

**Sessions** fill the gap. The server hands out an opaque **session id**
inside a cookie; the browser sends it back with every request; the server
uses it to look up a **session record** in its own storage.

# Anatomy of a session

- The cookie only carries the session id, optionally signed with a keyed HMAC
  so that forged or tampered ids are rejected (see [`CookieCodec`]).
- The session state lives server-side, in a [`SessionStore`], as a record
  holding the user data, the creation time and an absolute expiry time.
- Each request gets its own [`Session`] handle. The record is only loaded when
  the handle is first used, and only written back if it was read or changed.

# Session fixation, on purpose

The store can be configured to reproduce classic mistakes, for teaching purposes:

- Disable cookie signing by leaving [`CookieSigningConfig::secret`] unset.
- Accept the session id from a query parameter via [`InsecureConfig::query_param`].
- Accept ids that were never issued by the server via
  [`InsecureConfig::accept_client_session_id`].

All of them are off by default.

[`CookieSigningConfig::secret`]: crate::config::CookieSigningConfig::secret
[`InsecureConfig::query_param`]: crate::config::InsecureConfig::query_param
[`InsecureConfig::accept_client_session_id`]: crate::config::InsecureConfig::accept_client_session_id

## References

- [RFC 6265](https://datatracker.ietf.org/doc/html/rfc6265);
- [OWASP's session management cheat-sheet](https://cheatsheetseries.owasp.org/cheatsheets/Session_Management_Cheat_Sheet.html).
*/
mod codec;
pub mod config;
mod id;
mod incoming;
mod middleware;
mod session_;
mod store_;

pub use codec::{CookieCodec, errors::DecodeError};
pub use id::SessionId;
pub use incoming::IncomingSession;
pub use middleware::finalize_session;
pub use session_::Session;
pub use store_::SessionStore;

pub mod store {
    //! Types and traits related to [`SessionStore`][super::SessionStore].
    pub use crate::store_::errors;
    pub use crate::store_::{
        ExpiryCutoff, SessionRecord, SessionRecordRef, SessionStorageBackend,
    };
}

pub mod state {
    //! Types to inspect and manipulate the state of a [`Session`][super::Session].
    pub use crate::session_::errors;
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
/// Configure how sessions are managed.
///
/// The defaults are safe: cookies are signed (once you provide a secret),
/// session ids are only accepted from the session cookie and only if the
/// server issued them.
pub struct SessionConfig {
    #[serde(default)]
    /// Configure the session cookie.
    pub cookie: crate::config::SessionCookieConfig,
    #[serde(default)]
    /// Configure how the session cookie is signed.
    pub signing: crate::config::CookieSigningConfig,
    #[serde(default)]
    /// Configure how the session state should behave.
    pub state: crate::config::SessionStateConfig,
    #[serde(default)]
    /// Opt into deliberately insecure behaviour, for demonstration purposes.
    pub insecure: crate::config::InsecureConfig,
}

impl SessionConfig {
    /// Create a new session configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the codec used to encode and decode the session cookie value.
    pub fn codec(&self) -> CookieCodec {
        CookieCodec::new(&self.signing)
    }

    /// Get a reference to the cookie configuration.
    pub fn cookie_config(&self) -> &crate::config::SessionCookieConfig {
        &self.cookie
    }

    /// Get a reference to the session state configuration.
    pub fn state_config(&self) -> &crate::config::SessionStateConfig {
        &self.state
    }
}
