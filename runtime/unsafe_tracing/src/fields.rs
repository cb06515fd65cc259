//! Utilities to log common resources with consistent naming and representations.
//!
//! For each well-known resource, this module exposes:
//!
//! - A constant holding the conventional field name used when logging that resource
//! - A function to compute the conventional log representation of that resource
//!
//! For example, you have [`SESSION_ID`] and [`session_id`] for the `session.id` field.

use tracing::Value;

// Re-export error-related logging fields and the functions to set them.
pub use tracing_log_error::fields::*;

/// The field name for the identifier of the session attached to the current request.
///
/// Use [`session_id`] to populate the field.
pub const SESSION_ID: &str = "session.id";

/// The field name for the number of session records touched by a bulk operation.
///
/// Use [`session_count`] to populate the field.
pub const SESSION_COUNT: &str = "session.count";

/// The field name for the name of a user account.
///
/// Use [`user_name`] to populate the field.
pub const USER_NAME: &str = "user.name";

/// The field name for the password hashing scheme used for a stored credential.
///
/// Use [`password_scheme`] to populate the field.
pub const PASSWORD_SCHEME: &str = "password.scheme";

/// The canonical representation for the value in [`SESSION_ID`].
pub fn session_id<Id: std::fmt::Display>(id: Id) -> impl Value {
    tracing::field::display(id)
}

/// The canonical representation for the value in [`SESSION_COUNT`].
pub fn session_count(count: usize) -> impl Value {
    count as u64
}

/// The canonical representation for the value in [`USER_NAME`].
pub fn user_name(name: &str) -> impl Value + '_ {
    name
}

/// The canonical representation for the value in [`PASSWORD_SCHEME`].
pub fn password_scheme<S: std::fmt::Display>(scheme: S) -> impl Value {
    tracing::field::display(scheme)
}
