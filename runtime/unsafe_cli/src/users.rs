use crate::command::UsersCommand;
use crate::database;
use anyhow::Context;
use std::path::Path;
use unsafe_auth::{NewUser, PasswordContext, SqliteUserStore, User};

/// Run a `users` subcommand against the application database at `db`.
pub async fn run(db: &Path, command: UsersCommand) -> Result<User, anyhow::Error> {
    let store = SqliteUserStore::new(database::connect(db).await?, PasswordContext::default());
    store
        .migrate()
        .await
        .context("Failed to create the user table")?;
    match command {
        UsersCommand::Add {
            username,
            password,
            email,
            groups,
        } => {
            let user = store
                .create(NewUser {
                    username,
                    password,
                    email,
                    groups,
                })
                .await?;
            Ok(user)
        }
    }
}
