use anyhow::Context;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use unsafe_auth::{PasswordContext, SqliteUserStore};
use unsafe_session_sqlx::SqliteSessionStore;

/// Open the SQLite database at `path`, creating the file if it doesn't exist.
pub async fn connect(path: &Path) -> Result<SqlitePool, anyhow::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open the database at `{}`", path.display()))
}

/// Create the user table in `app_db` and the session table in `sessions_db`.
///
/// With `reset`, the existing tables are dropped first.
#[tracing::instrument(name = "Initialize databases", skip_all, fields(app_db = %app_db.display(), sessions_db = %sessions_db.display()))]
pub async fn init(app_db: &Path, sessions_db: &Path, reset: bool) -> Result<(), anyhow::Error> {
    let users = SqliteUserStore::new(connect(app_db).await?, PasswordContext::default());
    let sessions = SqliteSessionStore::new(connect(sessions_db).await?);
    if reset {
        users.reset().await.context("Failed to drop the user table")?;
        sessions
            .reset()
            .await
            .context("Failed to drop the session table")?;
        tracing::info!("Dropped the existing tables");
    }
    users
        .migrate()
        .await
        .context("Failed to create the user table")?;
    sessions
        .migrate()
        .await
        .context("Failed to create the session table")?;
    Ok(())
}
