//! Errors returned by the password and user store APIs.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// Something went wrong while hashing or verifying a password.
pub enum HashError {
    #[error("The hash doesn't match any of the configured password schemes")]
    /// No configured scheme recognises the stored hash.
    Unidentified,
    #[error("The stored hash is not a well-formed `{scheme}` hash")]
    /// The hash claims to belong to a scheme, but can't be parsed.
    Malformed {
        /// The name of the scheme.
        scheme: &'static str,
    },
    #[error("The operating system failed to provide randomness for a salt")]
    /// Failed to generate a salt.
    Randomness,
    #[error(transparent)]
    /// bcrypt failed.
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    /// argon2 failed.
    Argon2(#[from] argon2::password_hash::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("There is no user with id {user_id}")]
/// A user that was expected to exist does not exist.
pub struct UserNotFoundError {
    pub user_id: i64,
}

#[derive(Debug, thiserror::Error)]
#[error("The username `{username}` is already taken")]
/// A user with the same name already exists.
pub struct UserExistsError {
    pub username: String,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned by [`SqliteUserStore::from_id`][crate::SqliteUserStore::from_id].
pub enum LookupError {
    #[error(transparent)]
    NotFound(#[from] UserNotFoundError),
    #[error("Failed to query the user table")]
    Other(#[source] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned by [`SqliteUserStore::create`][crate::SqliteUserStore::create].
pub enum CreateUserError {
    #[error(transparent)]
    Exists(#[from] UserExistsError),
    #[error("Failed to hash the password of the new user")]
    Hash(#[from] HashError),
    #[error("Failed to store the new user")]
    Other(#[source] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned by [`SqliteUserStore::authenticate`][crate::SqliteUserStore::authenticate].
///
/// Wrong credentials are not an error: they're reported as `Ok(None)`.
pub enum AuthError {
    #[error("Failed to verify the password")]
    Hash(#[from] HashError),
    #[error("Something went wrong when validating credentials")]
    UnexpectedError(#[source] anyhow::Error),
}
