//! User accounts and password authentication.
//!
//! Passwords are hashed according to a [`PasswordContext`]: a ranked list of
//! [`PasswordScheme`]s where the first one is preferred and the others are only
//! kept around to verify legacy hashes. When a user logs in with a password
//! stored under a deprecated scheme, [`SqliteUserStore::authenticate`] rehashes it
//! with the preferred scheme and stores the new hash.
mod context;
pub mod errors;
mod pbkdf2;
mod scheme;
mod user;

pub use context::PasswordContext;
pub use scheme::PasswordScheme;
pub use user::{NewUser, SqliteUserStore, User};
