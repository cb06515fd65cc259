use crate::PasswordContext;
use crate::errors::{AuthError, CreateUserError, LookupError, UserExistsError, UserNotFoundError};
use anyhow::Context as _;
use redact::Secret;
use sqlx::SqlitePool;
use sqlx::error::DatabaseError;
use sqlx::sqlite::SqliteError;
use std::sync::Arc;
use unsafe_tracing::fields::{PASSWORD_SCHEME, USER_NAME, password_scheme, user_name};
use unsafe_tracing::spawn_blocking_with_tracing;

#[derive(Debug, Clone)]
/// A user account.
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: Option<String>,
    /// The password hash, encoded according to the scheme that produced it.
    pub password: Secret<String>,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone)]
/// The details required to create a new [`User`].
pub struct NewUser {
    pub username: String,
    /// The password, in clear text.
    pub password: Secret<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    username: String,
    password: String,
    email: Option<String>,
    groups: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: row.user_id,
            username: row.username,
            email: row.email,
            password: Secret::new(row.password),
            groups: row.groups.split_whitespace().map(ToOwned::to_owned).collect(),
        }
    }
}

#[derive(Debug, Clone)]
/// User accounts stored in the `user` table of a SQLite database.
pub struct SqliteUserStore {
    pool: SqlitePool,
    context: Arc<PasswordContext>,
}

impl SqliteUserStore {
    /// Creates a new user store, hashing passwords according to `context`.
    pub fn new(pool: SqlitePool, context: PasswordContext) -> Self {
        Self {
            pool,
            context: Arc::new(context),
        }
    }

    /// The connection pool backing this store.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The password context used by this store.
    pub fn context(&self) -> &PasswordContext {
        &self.context
    }

    /// Return the query used to create the user table.
    ///
    /// The query is idempotent.
    pub fn migration_query() -> &'static str {
        "CREATE TABLE IF NOT EXISTS user (
    user_id INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    email TEXT,
    groups TEXT NOT NULL DEFAULT ''
);"
    }

    /// Create the user table, if it doesn't exist yet.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        use sqlx::Executor as _;

        self.pool.execute(Self::migration_query()).await?;
        Ok(())
    }

    /// Drop the user table, if it exists.
    pub async fn reset(&self) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS user")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Find a user by name.
    #[tracing::instrument(name = "Get user by name", level = tracing::Level::DEBUG, skip_all)]
    pub async fn from_username(&self, username: &str) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, username, password, email, groups FROM user WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to retrieve a user by name")?;
        Ok(user.map(Into::into))
    }

    /// Find a user by id.
    ///
    /// It fails with [`LookupError::NotFound`] if there is no such user.
    #[tracing::instrument(name = "Get user by id", level = tracing::Level::DEBUG, skip_all)]
    pub async fn from_id(&self, user_id: i64) -> Result<User, LookupError> {
        let user = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, username, password, email, groups FROM user WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LookupError::Other(e.into()))?;
        match user {
            Some(user) => Ok(user.into()),
            None => Err(UserNotFoundError { user_id }.into()),
        }
    }

    /// Create a new user, hashing the password with the preferred scheme.
    ///
    /// It fails with [`CreateUserError::Exists`] if the name is already taken.
    #[tracing::instrument(name = "Create user", skip_all, fields(user.name = %new_user.username))]
    pub async fn create(&self, new_user: NewUser) -> Result<User, CreateUserError> {
        let NewUser {
            username,
            password,
            email,
            groups,
        } = new_user;
        if self
            .from_username(&username)
            .await
            .map_err(CreateUserError::Other)?
            .is_some()
        {
            return Err(UserExistsError { username }.into());
        }

        let context = Arc::clone(&self.context);
        let hash = spawn_blocking_with_tracing(move || context.hash(password.expose_secret()))
            .await
            .context("Failed to spawn blocking task.")
            .map_err(CreateUserError::Other)??;

        let result = sqlx::query(
            "INSERT INTO user (username, password, email, groups) VALUES (?, ?, ?, ?)",
        )
        .bind(&username)
        .bind(&hash)
        .bind(email.as_deref())
        .bind(groups.join(" "))
        .execute(&self.pool)
        .await;
        let user_id = match result {
            Ok(r) => r.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => return Err(UserExistsError { username }.into()),
            Err(e) => return Err(CreateUserError::Other(e.into())),
        };
        Ok(User {
            user_id,
            username,
            email,
            password: Secret::new(hash),
            groups,
        })
    }

    /// Check the credentials of a user.
    ///
    /// It returns the user if the password is correct, `None` if the user
    /// doesn't exist or the password is wrong.
    /// If the stored hash was produced by a deprecated scheme, it's replaced
    /// with a hash computed with the preferred one.
    ///
    /// # Timing attacks
    ///
    /// An unknown username still goes through a password verification, against
    /// a dummy hash, so that response times don't reveal which usernames exist.
    #[tracing::instrument(name = "Validate credentials", skip_all, fields(user.name = %username))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: Secret<String>,
    ) -> Result<Option<User>, AuthError> {
        let user = self
            .from_username(username)
            .await
            .map_err(AuthError::UnexpectedError)?;

        let context = Arc::clone(&self.context);
        let stored_hash = user.as_ref().map(|u| u.password.clone());
        let outcome = spawn_blocking_with_tracing(move || match stored_hash {
            Some(hash) => context
                .verify_and_update(password.expose_secret(), hash.expose_secret())
                .map(Some),
            None => context.dummy_verify(password.expose_secret()).map(|()| None),
        })
        .await
        .context("Failed to spawn blocking task.")
        .map_err(AuthError::UnexpectedError)??;

        let (Some(mut user), Some((valid, new_hash))) = (user, outcome) else {
            tracing::info!("Unknown username");
            return Ok(None);
        };
        if !valid {
            tracing::info!("Invalid password");
            return Ok(None);
        }
        if let Some(new_hash) = new_hash {
            self.replace_hash(user.user_id, &new_hash)
                .await
                .map_err(AuthError::UnexpectedError)?;
            tracing::info!(
                { USER_NAME } = user_name(&user.username),
                { PASSWORD_SCHEME } = password_scheme(self.context.preferred()),
                "Upgraded the password hash to the preferred scheme"
            );
            user.password = Secret::new(new_hash);
        }
        Ok(Some(user))
    }

    async fn replace_hash(&self, user_id: i64, new_hash: &str) -> Result<(), anyhow::Error> {
        sqlx::query("UPDATE user SET password = ? WHERE user_id = ?")
            .bind(new_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to store the upgraded password hash")?;
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|e| e.try_downcast_ref::<SqliteError>())
        // SQLITE_CONSTRAINT_UNIQUE
        .is_some_and(|e| e.code() == Some("2067".into()))
}
