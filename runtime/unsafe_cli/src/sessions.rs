use crate::command::SessionsCommand;
use crate::database;
use anyhow::Context;
use std::path::Path;
use unsafe_session::store::ExpiryCutoff;
use unsafe_session::{SessionId, SessionStore};
use unsafe_session_sqlx::SqliteSessionStore;

/// Run a `sessions` subcommand against the session database at `db`.
///
/// It returns the number of deleted sessions.
/// A database that doesn't exist holds no sessions: it is left alone.
pub async fn run(db: &Path, command: SessionsCommand) -> Result<usize, anyhow::Error> {
    // Parse user input before touching the database.
    let cutoff = match &command {
        SessionsCommand::Expire { time: Some(time) } => time
            .parse::<ExpiryCutoff>()
            .context("Invalid expiry time")?,
        _ => ExpiryCutoff::Now,
    };
    if !tokio::fs::try_exists(db)
        .await
        .with_context(|| format!("Failed to check if `{}` exists", db.display()))?
    {
        tracing::info!(db = %db.display(), "The session database doesn't exist");
        return Ok(0);
    }

    let backend = SqliteSessionStore::new(database::connect(db).await?);
    backend
        .migrate()
        .await
        .context("Failed to create the session table")?;
    let store = SessionStore::from(backend);

    let count = match command {
        SessionsCommand::Expire { .. } => store.expire(&cutoff).await?,
        SessionsCommand::Purge { unexpired: false } => store.purge_all().await?,
        SessionsCommand::Purge { unexpired: true } => store.purge_unexpired().await?,
        SessionsCommand::Cleanup => store.delete_expired().await?,
        SessionsCommand::Remove { ids } => {
            let ids: Vec<_> = ids.into_iter().filter_map(SessionId::from_client).collect();
            store.remove(&ids).await?
        }
    };
    Ok(count)
}
